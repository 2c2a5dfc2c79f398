//! Cached calendar objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subscription::SubscriptionId;


/// A locally stored copy of one remote calendar document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedEvent {
    subscription_id: SubscriptionId,
    uri: String,
    calendar_data: String,
    etag: VersionTag,
    last_modified: DateTime<Utc>,
    component_type: Option<String>,
}

impl CachedEvent {
    pub fn new(subscription_id: SubscriptionId, uri: String, calendar_data: String) -> Self {
        let etag = VersionTag::from_content(&calendar_data);
        let component_type = sniff_component_type(&calendar_data);
        Self {
            subscription_id, uri, calendar_data, etag, component_type,
            last_modified: Utc::now(),
        }
    }

    pub fn subscription_id(&self) -> SubscriptionId { self.subscription_id }
    pub fn uri(&self) -> &str { &self.uri }
    pub fn calendar_data(&self) -> &str { &self.calendar_data }
    pub fn etag(&self) -> &VersionTag { &self.etag }
    pub fn last_modified(&self) -> &DateTime<Utc> { &self.last_modified }
    pub fn size(&self) -> usize { self.calendar_data.len() }
    /// `VEVENT`, `VTODO` or `VJOURNAL`, if it could be told
    pub fn component_type(&self) -> Option<&str> { self.component_type.as_deref() }
}

/// The object name a document is cached under
pub fn object_uri(uid: &str) -> String {
    format!("{}.ics", uid)
}

fn sniff_component_type(calendar_data: &str) -> Option<String> {
    calendar_data.lines()
        .filter_map(|line| line.trim_end().strip_prefix("BEGIN:"))
        .map(|name| name.to_ascii_uppercase())
        .find(|name| name == "VEVENT" || name == "VTODO" || name == "VJOURNAL")
}


/// A VersionTag is the ETag of a cached object. Whenever it changes, this means the data has changed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionTag {
    tag: String
}

impl From<String> for VersionTag {
    fn from(tag: String) -> VersionTag {
        Self { tag }
    }
}

impl VersionTag {
    /// A quoted hash of the given content
    pub fn from_content(content: &str) -> Self {
        let hash = blake3::hash(content.as_bytes());
        Self { tag: format!("\"{}\"", hash.to_hex()) }
    }

    /// Get the inner version tag
    pub fn as_str(&self) -> &str {
        &self.tag
    }
}
