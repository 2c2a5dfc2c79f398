//! Webcal subscriptions, and the pending changes a refresh may make to them

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{DEFAULT_REFRESH_RATE, REFRESH_RATE_PROPERTY, SOURCE_PROPERTY};


/// Opaque identifier of a subscription, stable for the collection's lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId {
    content: uuid::Uuid,
}

impl SubscriptionId {
    /// Generate a random SubscriptionId.
    pub fn random() -> Self {
        Self { content: uuid::Uuid::new_v4() }
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content.to_hyphenated())
    }
}

impl FromStr for SubscriptionId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { content: s.parse()? })
    }
}


bitflags! {
    /// What gets removed from the feed before it is cached
    #[derive(Serialize, Deserialize)]
    pub struct StripFlags: u8 {
        /// Drop whole VTODO documents
        const TODOS = 1;
        /// Drop VALARM sub-components
        const ALARMS = 2;
        /// Drop ATTACH properties
        const ATTACHMENTS = 4;
    }
}

impl Default for StripFlags {
    fn default() -> Self {
        Self::all()
    }
}


/// A local, read-only calendar collection mirroring a remote feed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    id: SubscriptionId,
    principal_uri: String,
    uri: String,
    source: String,
    refresh_rate: Option<String>,
    #[serde(default)]
    strip: StripFlags,
    last_run: Option<DateTime<Utc>>,

    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    order: i32,
    #[serde(default)]
    owner_principal: Option<String>,
}

impl Subscription {
    /// Create a subscription that has never been refreshed, with every strip flag set
    pub fn new<P: ToString, U: ToString, S: ToString>(principal_uri: P, uri: U, source: S) -> Self {
        Self {
            id: SubscriptionId::random(),
            principal_uri: principal_uri.to_string(),
            uri: uri.to_string(),
            source: source.to_string(),
            refresh_rate: None,
            strip: StripFlags::default(),
            last_run: None,
            display_name: None,
            color: None,
            order: 0,
            owner_principal: None,
        }
    }

    pub fn id(&self) -> SubscriptionId { self.id }
    pub fn principal_uri(&self) -> &str { &self.principal_uri }
    pub fn uri(&self) -> &str { &self.uri }
    pub fn source(&self) -> &str { &self.source }
    pub fn refresh_rate(&self) -> Option<&str> { self.refresh_rate.as_deref() }
    pub fn strip(&self) -> StripFlags { self.strip }
    pub fn last_run(&self) -> Option<DateTime<Utc>> { self.last_run }
    pub fn display_name(&self) -> Option<&str> { self.display_name.as_deref() }
    pub fn color(&self) -> Option<&str> { self.color.as_deref() }
    pub fn order(&self) -> i32 { self.order }
    pub fn owner_principal(&self) -> Option<&str> { self.owner_principal.as_deref() }

    /// The stored refresh rate, or the default one
    pub fn effective_refresh_rate(&self) -> &str {
        self.refresh_rate.as_deref().unwrap_or(DEFAULT_REFRESH_RATE)
    }

    pub fn strips_todos(&self) -> bool { self.strip.contains(StripFlags::TODOS) }
    pub fn strips_alarms(&self) -> bool { self.strip.contains(StripFlags::ALARMS) }
    pub fn strips_attachments(&self) -> bool { self.strip.contains(StripFlags::ATTACHMENTS) }

    pub fn with_refresh_rate<S: ToString>(mut self, rate: Option<S>) -> Self {
        self.refresh_rate = rate.map(|r| r.to_string());
        self
    }
    pub fn with_strip(mut self, strip: StripFlags) -> Self {
        self.strip = strip;
        self
    }
    pub fn with_last_run(mut self, last_run: Option<DateTime<Utc>>) -> Self {
        self.last_run = last_run;
        self
    }
    pub fn with_owner_principal<S: ToString>(mut self, owner: Option<S>) -> Self {
        self.owner_principal = owner.map(|o| o.to_string());
        self
    }

    // These are meant for storage backends, that are the only ones allowed to commit changes

    pub fn set_source(&mut self, source: String) { self.source = source; }
    pub fn set_refresh_rate(&mut self, rate: Option<String>) { self.refresh_rate = rate; }
    pub fn set_strip_flag(&mut self, flag: StripFlags, enabled: bool) { self.strip.set(flag, enabled); }
    pub fn set_last_run(&mut self, last_run: Option<DateTime<Utc>>) { self.last_run = last_run; }
    pub fn set_display_name(&mut self, name: Option<String>) { self.display_name = name; }
    pub fn set_color(&mut self, color: Option<String>) { self.color = color; }
    pub fn set_order(&mut self, order: i32) { self.order = order; }
}


/// Property changes accumulated during one refresh, committed at once at the end of it.
///
/// Insertion order is kept. Setting a property twice replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutationSet {
    mutations: Vec<(String, String)>,
}

impl MutationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        let name = name.into();
        let value = value.into();
        match self.mutations.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.mutations.push((name, value)),
        }
    }

    /// Record that the feed permanently moved to `location`
    pub fn set_source(&mut self, location: &Url) {
        self.set(SOURCE_PROPERTY, location.as_str());
    }

    /// Record a refresh rate suggested by the feed
    pub fn set_refresh_rate(&mut self, rate: &str) {
        self.set(REFRESH_RATE_PROPERTY, rate);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.mutations.iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mutations.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_subscription_defaults() {
        let sub = Subscription::new("principals/users/alice", "holidays", "https://example.com/holidays.ics");
        assert!(sub.strips_todos());
        assert!(sub.strips_alarms());
        assert!(sub.strips_attachments());
        assert_eq!(sub.refresh_rate(), None);
        assert_eq!(sub.effective_refresh_rate(), "P1W");
        assert_eq!(sub.last_run(), None);
    }

    #[test]
    fn test_mutation_set_keeps_order_and_replaces() {
        let mut mutations = MutationSet::new();
        assert!(mutations.is_empty());

        mutations.set_source(&"https://example.com/new.ics".parse().unwrap());
        mutations.set_refresh_rate("PT1H");
        mutations.set_refresh_rate("PT2H");

        let names: Vec<&str> = mutations.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec![SOURCE_PROPERTY, REFRESH_RATE_PROPERTY]);
        assert_eq!(mutations.get(REFRESH_RATE_PROPERTY), Some("PT2H"));
        assert_eq!(mutations.len(), 2);
    }

    #[test]
    fn serde_subscription() {
        let sub = Subscription::new("principals/users/bob", "sports", "webcal://example.com/sports")
            .with_strip(StripFlags::ALARMS)
            .with_refresh_rate(Some("PT6H"));
        let json = serde_json::to_string(&sub).unwrap();
        let back: Subscription = serde_json::from_str(&json).unwrap();
        assert_eq!(sub, back);
        assert_eq!(back.strips_todos(), false);
    }
}
