use async_trait::async_trait;

use crate::error::{WebcalError, WebcalResult};
use crate::item::CachedEvent;
use crate::query::CalendarQuery;
use crate::subscription::{MutationSet, Subscription, SubscriptionId};


/// A cached event the storage refused to write
#[derive(Debug)]
pub struct RejectedEvent {
    pub uri: String,
    pub error: WebcalError,
}

/// Where subscriptions and their cached events are stored.
///
/// Refresh jobs and read-only collections are given a backend when they are built.
/// Implementors use interior mutability, so that both can share it.
#[async_trait]
pub trait SubscriptionBackend: Send + Sync {
    /// Returns every subscription of a principal
    async fn get_subscriptions_for_user(&self, principal_uri: &str) -> WebcalResult<Vec<Subscription>>;

    /// Commit property changes to a subscription, all at once
    async fn update_subscription(&self, id: SubscriptionId, mutations: &MutationSet) -> WebcalResult<()>;

    /// Delete a subscription, along with its cached events
    async fn delete_subscription(&self, id: SubscriptionId) -> WebcalResult<()>;

    /// Remove every cached event of a subscription
    async fn purge_all_cached_events(&self, id: SubscriptionId) -> WebcalResult<()>;

    /// Store one cached event.
    /// This fails with [`WebcalError::InvalidEvent`] when the event cannot be stored under this uri.
    async fn add_cached_event(&self, id: SubscriptionId, uri: &str, calendar_data: &str) -> WebcalResult<()>;

    /// Replace the whole set of cached events of a subscription with `events` (`(uri, calendar data)` pairs).
    ///
    /// Returns the events that were refused. Backends that can swap sets atomically should
    /// override this; the default implementation purges, then adds events one by one.
    async fn replace_cached_events(&self, id: SubscriptionId, events: Vec<(String, String)>) -> WebcalResult<Vec<RejectedEvent>> {
        self.purge_all_cached_events(id).await?;

        let mut rejected = Vec::new();
        for (uri, data) in events {
            if let Err(error) = self.add_cached_event(id, &uri, &data).await {
                rejected.push(RejectedEvent { uri, error });
            }
        }
        Ok(rejected)
    }

    /// Returns a cached event, if it exists
    async fn get_cached_object(&self, id: SubscriptionId, uri: &str) -> WebcalResult<Option<CachedEvent>>;

    /// Returns every cached event of a subscription
    async fn get_cached_objects(&self, id: SubscriptionId) -> WebcalResult<Vec<CachedEvent>>;

    /// Returns the cached events matching these uris. Unknown uris are ignored
    async fn get_multiple_cached_objects(&self, id: SubscriptionId, uris: &[String]) -> WebcalResult<Vec<CachedEvent>>;

    /// Returns the uris of the cached events matching `filters`
    async fn cached_calendar_query(&self, id: SubscriptionId, filters: &CalendarQuery) -> WebcalResult<Vec<String>>;
}
