//! This module provides a local cache for webcal subscriptions and their cached events
//!
//! It is a [`SubscriptionBackend`] that lives in memory and can be saved to (and loaded from) a folder.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config;
use crate::duration::DurationInterval;
use crate::error::{WebcalError, WebcalResult};
use crate::item::CachedEvent;
use crate::mock_behaviour::MockBehaviour;
use crate::query::CalendarQuery;
use crate::subscription::{MutationSet, StripFlags, Subscription, SubscriptionId};
use crate::traits::{RejectedEvent, SubscriptionBackend};

const MAIN_FILE: &str = "subscriptions.json";


/// A subscription storage that keeps its data in memory, and can persist it into a folder
#[derive(Debug)]
pub struct Cache {
    backing_folder: PathBuf,
    data: Mutex<CachedData>,

    mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedData {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    #[serde(skip)]
    events: HashMap<SubscriptionId, BTreeMap<String, CachedEvent>>,
}

impl Cache {
    /// Initialize a cache from the content of a valid backing folder if it exists.
    /// Returns an error otherwise
    pub fn from_folder(folder: &Path) -> WebcalResult<Self> {
        let main_file = folder.join(MAIN_FILE);
        let mut data: CachedData = match std::fs::File::open(&main_file) {
            Err(err) => {
                return Err(WebcalError::Backend(format!("Unable to open file {:?}: {}", main_file, err)));
            },
            Ok(file) => serde_json::from_reader(file)?,
        };

        for sub in data.subscriptions.values() {
            let events_file = folder.join(events_file_name(sub));
            let events: BTreeMap<String, CachedEvent> = match std::fs::File::open(&events_file) {
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("No cached events for subscription {}", sub.id());
                    BTreeMap::new()
                },
                Err(err) => {
                    log::warn!("Unable to open the cached events of subscription {} ({:?}): {}", sub.id(), events_file, err);
                    return Err(err.into());
                },
                Ok(file) => serde_json::from_reader(file)?,
            };
            data.events.insert(sub.id(), events);
        }

        Ok(Self {
            backing_folder: PathBuf::from(folder),
            data: Mutex::new(data),
            mock_behaviour: None,
        })
    }

    /// Initialize a cache with the default contents
    pub fn new(folder: &Path) -> Self {
        Self {
            backing_folder: PathBuf::from(folder),
            data: Mutex::new(CachedData::default()),
            mock_behaviour: None,
        }
    }

    /// Store the current Cache to its backing folder
    pub fn save_to_folder(&self) -> WebcalResult<()> {
        let folder = &self.backing_folder;
        std::fs::create_dir_all(folder)?;

        let data = self.data();
        let main_file = folder.join(MAIN_FILE);
        let file = std::fs::File::create(&main_file)?;
        serde_json::to_writer(file, &*data)?;

        for (id, events) in &data.events {
            let sub = match data.subscriptions.get(id) {
                Some(sub) => sub,
                None => continue,
            };
            let events_file = folder.join(events_file_name(sub));
            let file = std::fs::File::create(&events_file)?;
            serde_json::to_writer(file, events)?;
        }

        Ok(())
    }

    pub fn set_mock_behaviour(&mut self, mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>) {
        self.mock_behaviour = mock_behaviour;
    }

    /// Register a new subscription. Its uri must be unique for its principal
    pub fn add_subscription(&self, subscription: Subscription) -> WebcalResult<()> {
        let mut data = self.data();
        let taken = data.subscriptions.values().any(|s| {
            s.principal_uri() == subscription.principal_uri() && s.uri() == subscription.uri()
        });
        if taken {
            return Err(WebcalError::Backend(format!("{} already has a subscription named {}", subscription.principal_uri(), subscription.uri())));
        }

        data.events.insert(subscription.id(), BTreeMap::new());
        data.subscriptions.insert(subscription.id(), subscription);
        Ok(())
    }

    /// Returns a subscription by its id
    pub fn get_subscription(&self, id: SubscriptionId) -> Option<Subscription> {
        self.data().subscriptions.get(&id).cloned()
    }

    /// Record when a subscription has last been processed by the scheduler
    pub fn set_last_run(&self, id: SubscriptionId, last_run: DateTime<Utc>) -> WebcalResult<()> {
        let mut data = self.data();
        let sub = data.subscriptions.get_mut(&id).ok_or(WebcalError::UnknownSubscription(id))?;
        sub.set_last_run(Some(last_run));
        Ok(())
    }

    fn data(&self) -> MutexGuard<'_, CachedData> {
        match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn mock<F>(&self, check: F) -> WebcalResult<()>
    where
        F: FnOnce(&mut MockBehaviour) -> WebcalResult<()>,
    {
        match &self.mock_behaviour {
            None => Ok(()),
            Some(mock) => match mock.lock() {
                Ok(mut behaviour) => check(&mut behaviour),
                Err(poisoned) => check(&mut poisoned.into_inner()),
            },
        }
    }
}

/// Named after the subscription id, which is unique and never changes
fn events_file_name(sub: &Subscription) -> String {
    sanitize_filename::sanitize(format!("{}.json", sub.id()))
}

/// Check a cached event can be stored under this uri
fn validate_event(uri: &str, calendar_data: &str) -> WebcalResult<()> {
    let invalid = |reason: &str| Err(WebcalError::InvalidEvent { uri: uri.to_string(), reason: reason.to_string() });

    let basename = match uri.strip_suffix(".ics") {
        Some(b) => b,
        None => return invalid("object names must end with .ics"),
    };
    if basename.trim().is_empty() {
        return invalid("empty object name");
    }
    if uri.contains('/') || uri.chars().any(|c| c.is_control()) {
        return invalid("object names cannot contain slashes or control characters");
    }
    if calendar_data.trim_start().starts_with("BEGIN:VCALENDAR") == false {
        return invalid("calendar data must be a VCALENDAR");
    }
    Ok(())
}

/// Apply property changes to a copy of a subscription
fn apply_mutations(sub: &Subscription, mutations: &MutationSet) -> WebcalResult<Subscription> {
    let mut updated = sub.clone();
    for (name, value) in mutations.iter() {
        match name {
            config::SOURCE_PROPERTY => {
                let url: Url = value.parse()
                    .map_err(|err| WebcalError::Backend(format!("Invalid source {:?}: {}", value, err)))?;
                updated.set_source(url.to_string());
            },
            config::REFRESH_RATE_PROPERTY => {
                DurationInterval::parse(value)?;
                updated.set_refresh_rate(Some(value.to_string()));
            },
            config::DISPLAY_NAME_PROPERTY => updated.set_display_name(Some(value.to_string())),
            config::CALENDAR_COLOR_PROPERTY => {
                csscolorparser::parse(value)
                    .map_err(|err| WebcalError::Backend(format!("Invalid color {:?}: {}", value, err)))?;
                updated.set_color(Some(value.to_string()));
            },
            config::CALENDAR_ORDER_PROPERTY => {
                let order = value.parse()
                    .map_err(|_| WebcalError::Backend(format!("Invalid calendar order {:?}", value)))?;
                updated.set_order(order);
            },
            config::STRIP_TODOS_PROPERTY => updated.set_strip_flag(StripFlags::TODOS, parse_flag(value)?),
            config::STRIP_ALARMS_PROPERTY => updated.set_strip_flag(StripFlags::ALARMS, parse_flag(value)?),
            config::STRIP_ATTACHMENTS_PROPERTY => updated.set_strip_flag(StripFlags::ATTACHMENTS, parse_flag(value)?),
            other => return Err(WebcalError::Backend(format!("Unsupported subscription property {}", other))),
        }
    }
    Ok(updated)
}

fn parse_flag(value: &str) -> WebcalResult<bool> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(WebcalError::Backend(format!("Invalid flag value {:?}", other))),
    }
}


#[async_trait]
impl SubscriptionBackend for Cache {
    async fn get_subscriptions_for_user(&self, principal_uri: &str) -> WebcalResult<Vec<Subscription>> {
        self.mock(|m| m.can_get_subscriptions())?;

        let mut subs: Vec<Subscription> = self.data().subscriptions.values()
            .filter(|s| s.principal_uri() == principal_uri)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.order());
        Ok(subs)
    }

    async fn update_subscription(&self, id: SubscriptionId, mutations: &MutationSet) -> WebcalResult<()> {
        self.mock(|m| m.can_update_subscription())?;

        let mut data = self.data();
        let sub = data.subscriptions.get(&id).ok_or(WebcalError::UnknownSubscription(id))?;
        let updated = apply_mutations(sub, mutations)?;
        data.subscriptions.insert(id, updated);
        Ok(())
    }

    async fn delete_subscription(&self, id: SubscriptionId) -> WebcalResult<()> {
        let mut data = self.data();
        if data.subscriptions.remove(&id).is_none() {
            return Err(WebcalError::UnknownSubscription(id));
        }
        data.events.remove(&id);
        Ok(())
    }

    async fn purge_all_cached_events(&self, id: SubscriptionId) -> WebcalResult<()> {
        self.mock(|m| m.can_purge())?;

        let mut data = self.data();
        if data.subscriptions.contains_key(&id) == false {
            return Err(WebcalError::UnknownSubscription(id));
        }
        data.events.insert(id, BTreeMap::new());
        Ok(())
    }

    async fn add_cached_event(&self, id: SubscriptionId, uri: &str, calendar_data: &str) -> WebcalResult<()> {
        self.mock(|m| m.can_add_cached_event())?;
        validate_event(uri, calendar_data)?;

        let mut data = self.data();
        if data.subscriptions.contains_key(&id) == false {
            return Err(WebcalError::UnknownSubscription(id));
        }
        let events = data.events.entry(id).or_default();
        if events.contains_key(uri) {
            return Err(WebcalError::InvalidEvent { uri: uri.to_string(), reason: "an object with this name already exists".to_string() });
        }
        events.insert(uri.to_string(), CachedEvent::new(id, uri.to_string(), calendar_data.to_string()));
        Ok(())
    }

    /// The new set is built aside, and swapped in at once
    async fn replace_cached_events(&self, id: SubscriptionId, events: Vec<(String, String)>) -> WebcalResult<Vec<RejectedEvent>> {
        self.mock(|m| m.can_purge())?;
        if self.data().subscriptions.contains_key(&id) == false {
            return Err(WebcalError::UnknownSubscription(id));
        }

        let mut staged = BTreeMap::new();
        let mut rejected = Vec::new();
        for (uri, calendar_data) in events {
            let check = self.mock(|m| m.can_add_cached_event())
                .and_then(|_| validate_event(&uri, &calendar_data))
                .and_then(|_| match staged.contains_key(&uri) {
                    true => Err(WebcalError::InvalidEvent { uri: uri.clone(), reason: "an object with this name already exists".to_string() }),
                    false => Ok(()),
                });
            match check {
                Err(error) => rejected.push(RejectedEvent { uri, error }),
                Ok(()) => {
                    let event = CachedEvent::new(id, uri.clone(), calendar_data);
                    staged.insert(uri, event);
                },
            }
        }

        self.data().events.insert(id, staged);
        Ok(rejected)
    }

    async fn get_cached_object(&self, id: SubscriptionId, uri: &str) -> WebcalResult<Option<CachedEvent>> {
        Ok(self.data().events.get(&id).and_then(|events| events.get(uri)).cloned())
    }

    async fn get_cached_objects(&self, id: SubscriptionId) -> WebcalResult<Vec<CachedEvent>> {
        Ok(self.data().events.get(&id)
            .map(|events| events.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_multiple_cached_objects(&self, id: SubscriptionId, uris: &[String]) -> WebcalResult<Vec<CachedEvent>> {
        let data = self.data();
        let events = match data.events.get(&id) {
            None => return Ok(Vec::new()),
            Some(events) => events,
        };
        Ok(uris.iter()
            .filter_map(|uri| events.get(uri))
            .cloned()
            .collect())
    }

    async fn cached_calendar_query(&self, id: SubscriptionId, filters: &CalendarQuery) -> WebcalResult<Vec<String>> {
        let events = self.get_cached_objects(id).await?;
        Ok(events.iter()
            .filter(|event| filters.matches(event))
            .map(|event| event.uri().to_string())
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:a\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    fn cache_with_subscription() -> (Cache, SubscriptionId) {
        let cache = Cache::new(Path::new("unused"));
        let sub = Subscription::new("principals/users/alice", "holidays", "https://example.com/h.ics");
        let id = sub.id();
        cache.add_subscription(sub).unwrap();
        (cache, id)
    }

    #[tokio::test]
    async fn test_add_and_purge() {
        let (cache, id) = cache_with_subscription();
        cache.add_cached_event(id, "a.ics", DATA).await.unwrap();
        assert_eq!(cache.get_cached_objects(id).await.unwrap().len(), 1);
        assert!(cache.get_cached_object(id, "a.ics").await.unwrap().is_some());

        cache.purge_all_cached_events(id).await.unwrap();
        assert!(cache.get_cached_objects(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_events_are_rejected() {
        let (cache, id) = cache_with_subscription();
        assert!(matches!(cache.add_cached_event(id, ".ics", DATA).await, Err(WebcalError::InvalidEvent { .. })));
        assert!(matches!(cache.add_cached_event(id, "a", DATA).await, Err(WebcalError::InvalidEvent { .. })));
        assert!(matches!(cache.add_cached_event(id, "a/b.ics", DATA).await, Err(WebcalError::InvalidEvent { .. })));
        assert!(matches!(cache.add_cached_event(id, "a.ics", "garbage").await, Err(WebcalError::InvalidEvent { .. })));

        cache.add_cached_event(id, "a.ics", DATA).await.unwrap();
        assert!(matches!(cache.add_cached_event(id, "a.ics", DATA).await, Err(WebcalError::InvalidEvent { .. })));
    }

    #[tokio::test]
    async fn test_replace_swaps_the_whole_set() {
        let (cache, id) = cache_with_subscription();
        cache.add_cached_event(id, "old.ics", DATA).await.unwrap();

        let rejected = cache.replace_cached_events(id, vec![
            ("a.ics".to_string(), DATA.to_string()),
            (".ics".to_string(), DATA.to_string()),
            ("a.ics".to_string(), DATA.to_string()),
        ]).await.unwrap();

        assert_eq!(rejected.len(), 2);
        let uris: Vec<String> = cache.get_cached_objects(id).await.unwrap().iter().map(|e| e.uri().to_string()).collect();
        assert_eq!(uris, vec!["a.ics".to_string()]);
    }

    #[tokio::test]
    async fn test_update_subscription() {
        let (cache, id) = cache_with_subscription();

        let mut mutations = MutationSet::new();
        mutations.set_source(&"https://example.com/moved.ics".parse().unwrap());
        mutations.set_refresh_rate("PT6H");
        mutations.set(config::CALENDAR_COLOR_PROPERTY, "#ff0000");
        mutations.set(config::STRIP_TODOS_PROPERTY, "0");
        cache.update_subscription(id, &mutations).await.unwrap();

        let sub = cache.get_subscription(id).unwrap();
        assert_eq!(sub.source(), "https://example.com/moved.ics");
        assert_eq!(sub.refresh_rate(), Some("PT6H"));
        assert_eq!(sub.color(), Some("#ff0000"));
        assert_eq!(sub.strips_todos(), false);

        // Changes are all-or-nothing
        let mut bad = MutationSet::new();
        bad.set(config::DISPLAY_NAME_PROPERTY, "Renamed");
        bad.set_refresh_rate("often");
        assert!(cache.update_subscription(id, &bad).await.is_err());
        assert_eq!(cache.get_subscription(id).unwrap().display_name(), None);
    }

    #[tokio::test]
    async fn test_uri_is_unique_per_principal() {
        let (cache, _) = cache_with_subscription();
        let dup = Subscription::new("principals/users/alice", "holidays", "https://example.com/other.ics");
        assert!(cache.add_subscription(dup).is_err());
        let other_owner = Subscription::new("principals/users/bob", "holidays", "https://example.com/h.ics");
        assert!(cache.add_subscription(other_owner).is_ok());
    }

    #[tokio::test]
    async fn serde_cache() {
        let folder = tempfile::tempdir().unwrap();
        let cache = Cache::new(folder.path());
        let sub = Subscription::new("principals/users/alice", "holidays", "https://example.com/h.ics");
        let id = sub.id();
        cache.add_subscription(sub).unwrap();
        cache.add_cached_event(id, "a.ics", DATA).await.unwrap();
        cache.save_to_folder().unwrap();

        let retrieved = Cache::from_folder(folder.path()).unwrap();
        assert_eq!(retrieved.get_subscription(id), cache.get_subscription(id));
        assert_eq!(retrieved.get_cached_objects(id).await.unwrap(), cache.get_cached_objects(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_similar_names_do_not_share_a_file() {
        let folder = tempfile::tempdir().unwrap();
        let cache = Cache::new(folder.path());
        let first = Subscription::new("a_b", "c", "https://example.com/1.ics");
        let second = Subscription::new("a", "b_c", "https://example.com/2.ics");
        cache.add_subscription(first.clone()).unwrap();
        cache.add_subscription(second.clone()).unwrap();
        cache.add_cached_event(first.id(), "one.ics", DATA).await.unwrap();
        cache.add_cached_event(second.id(), "two.ics", DATA).await.unwrap();
        cache.save_to_folder().unwrap();

        let retrieved = Cache::from_folder(folder.path()).unwrap();
        let uris = |events: Vec<CachedEvent>| events.iter().map(|e| e.uri().to_string()).collect::<Vec<_>>();
        assert_eq!(uris(retrieved.get_cached_objects(first.id()).await.unwrap()), vec!["one.ics".to_string()]);
        assert_eq!(uris(retrieved.get_cached_objects(second.id()).await.unwrap()), vec!["two.ics".to_string()]);
    }

    #[tokio::test]
    async fn test_unreadable_events_file_is_an_error() {
        let folder = tempfile::tempdir().unwrap();
        let cache = Cache::new(folder.path());
        let sub = Subscription::new("principals/users/alice", "holidays", "https://example.com/h.ics");
        cache.add_subscription(sub.clone()).unwrap();
        cache.save_to_folder().unwrap();

        // A directory where the events file should be cannot be read as a file
        let events_file = folder.path().join(events_file_name(&sub));
        std::fs::remove_file(&events_file).unwrap();
        std::fs::create_dir(&events_file).unwrap();
        assert!(Cache::from_folder(folder.path()).is_err());

        // A missing one simply means there is nothing cached
        std::fs::remove_dir(&events_file).unwrap();
        let retrieved = Cache::from_folder(folder.path()).unwrap();
        assert!(retrieved.get_cached_objects(sub.id()).await.unwrap().is_empty());
    }
}
