//! A read-only calendar collection backed by the cache of a subscription

use std::sync::Arc;

use crate::error::{WebcalError, WebcalResult};
use crate::item::CachedEvent;
use crate::query::CalendarQuery;
use crate::subscription::{MutationSet, Subscription};
use crate::traits::SubscriptionBackend;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Privilege {
    Read,
}

/// One access control entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AclEntry {
    pub privilege: Privilege,
    pub principal: String,
    /// Protected entries cannot be changed by clients
    pub protected: bool,
}


/// Serves the cached events of a subscription as a calendar collection.
///
/// Clients can list, get and query objects. Everything that would write an object is refused,
/// the content of the collection only changes when the subscription is refreshed.
pub struct CachedSubscription<B: SubscriptionBackend> {
    backend: Arc<B>,
    subscription: Subscription,
}

impl<B: SubscriptionBackend> CachedSubscription<B> {
    pub fn new(backend: Arc<B>, subscription: Subscription) -> Self {
        Self { backend, subscription }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// The principal this collection belongs to
    pub fn owner(&self) -> &str {
        self.subscription.owner_principal()
            .unwrap_or_else(|| self.subscription.principal_uri())
    }

    /// The owner can read, and that's all
    pub fn acl(&self) -> Vec<AclEntry> {
        vec![AclEntry {
            privilege: Privilege::Read,
            principal: self.owner().to_string(),
            protected: true,
        }]
    }

    /// Cached objects share the ACL of their collection
    pub fn child_acl(&self) -> Vec<AclEntry> {
        self.acl()
    }

    pub async fn get_children(&self) -> WebcalResult<Vec<CachedEvent>> {
        self.backend.get_cached_objects(self.subscription.id()).await
    }

    pub async fn get_child(&self, name: &str) -> WebcalResult<CachedEvent> {
        self.backend.get_cached_object(self.subscription.id(), name).await?
            .ok_or_else(|| WebcalError::NotFound(format!("Calendar object not found: {}", name)))
    }

    /// Unknown names are ignored
    pub async fn get_multiple_children(&self, names: &[String]) -> WebcalResult<Vec<CachedEvent>> {
        self.backend.get_multiple_cached_objects(self.subscription.id(), names).await
    }

    pub async fn child_exists(&self, name: &str) -> WebcalResult<bool> {
        let object = self.backend.get_cached_object(self.subscription.id(), name).await?;
        Ok(object.is_some())
    }

    /// Returns the names of the objects matching `filters`
    pub async fn calendar_query(&self, filters: &CalendarQuery) -> WebcalResult<Vec<String>> {
        self.backend.cached_calendar_query(self.subscription.id(), filters).await
    }

    pub fn create_file(&self, name: &str, _data: &str) -> WebcalResult<()> {
        Err(WebcalError::NotAllowed(format!("Creating objects is not allowed in a subscription ({})", name)))
    }

    pub fn put_child(&self, name: &str, _data: &str) -> WebcalResult<()> {
        Err(WebcalError::NotAllowed(format!("Objects of a subscription cannot be modified ({})", name)))
    }

    pub fn delete_child(&self, name: &str) -> WebcalResult<()> {
        Err(WebcalError::NotAllowed(format!("Objects of a subscription cannot be deleted ({})", name)))
    }

    /// Subscriptions do not support sync tokens. Clients have to compare ETags
    pub fn sync_token(&self) -> Option<String> {
        None
    }

    /// Change properties of the subscription itself (display name, color...)
    pub async fn prop_patch(&self, mutations: &MutationSet) -> WebcalResult<()> {
        self.backend.update_subscription(self.subscription.id(), mutations).await
    }

    /// Unsubscribe, and drop the cached events
    pub async fn delete(self) -> WebcalResult<()> {
        self.backend.delete_subscription(self.subscription.id()).await
    }
}
