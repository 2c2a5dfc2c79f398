//! This crate mirrors webcal subscriptions into a local cache.
//!
//! A webcal subscription is a read-only calendar, whose content is published by a remote server as a plain iCal feed.
//! Rather than downloading that feed every time a client wants to read it, a [`Refresher`](refresh::Refresher)
//! periodically fetches it, splits it into single calendar objects and stores them into a [`SubscriptionBackend`](traits::SubscriptionBackend).
//!
//! The cached objects are then served by a [`CachedSubscription`](cached_subscription::CachedSubscription),
//! a read-only collection that can be listed and queried like any other calendar.
//!
//! This crate also provides a local, file-backed storage in the [`cache`] module, and the feed download in the [`client`] module.

pub mod config;
pub mod error;
pub use error::{WebcalError, WebcalResult};
pub mod duration;
pub mod traits;

mod subscription;
pub use subscription::{MutationSet, StripFlags, Subscription, SubscriptionId};
mod item;
pub use item::{object_uri, CachedEvent, VersionTag};
pub mod query;
pub use query::CalendarQuery;
pub mod ical;

pub mod client;
pub mod cache;
pub mod mock_behaviour;
pub mod refresh;
pub use refresh::{Refresher, RefreshOutcome};
pub mod cached_subscription;
pub use cached_subscription::CachedSubscription;
