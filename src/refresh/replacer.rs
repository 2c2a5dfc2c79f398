//! Replacement of the cached events of a subscription with the content of its feed

use std::collections::HashMap;
use std::io::BufRead;

use crate::error::WebcalResult;
use crate::ical::{ContentStripper, Document, Splitter};
use crate::item::object_uri;
use crate::subscription::Subscription;
use crate::traits::SubscriptionBackend;
use super::progress::{RefreshEvent, RefreshProgress};


/// When the old cached events are removed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PurgePolicy {
    /// The whole feed is split and kept in memory, then swapped in at once.
    /// A feed that turns out to be broken leaves the cache untouched.
    /// Recurrence overrides are cached along with their master, even when they are far from it in the feed.
    Deferred,
    /// The cache is purged as soon as the feed looks like iCal data, then filled one document at a time.
    /// A feed that turns out to be broken leaves a partial cache behind.
    /// Only overrides that directly follow their master are cached with it; later ones are rejected as duplicates.
    Eager,
}

impl Default for PurgePolicy {
    fn default() -> Self {
        PurgePolicy::Deferred
    }
}


/// What happened to the documents of a feed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplaceSummary {
    /// Documents now in the cache
    pub stored: usize,
    /// To-dos that have been left out
    pub stripped: usize,
    /// Documents without a UID
    pub skipped: usize,
    /// Uris the backend refused to store
    pub rejected: Vec<String>,
}


/// Writes the documents of a feed into the cache of a subscription
pub struct CacheReplacer<'a, B: SubscriptionBackend + ?Sized> {
    backend: &'a B,
    subscription: &'a Subscription,
    policy: PurgePolicy,
    stripper: ContentStripper,
}

impl<'a, B: SubscriptionBackend + ?Sized> CacheReplacer<'a, B> {
    pub fn new(backend: &'a B, subscription: &'a Subscription, policy: PurgePolicy) -> Self {
        Self {
            backend,
            subscription,
            policy,
            stripper: ContentStripper::new(subscription.strip()),
        }
    }

    /// Consume `splitter`, and store what it yields.
    ///
    /// Fails with [`WebcalError::FeedParse`] when the feed is broken, or with the backend error
    /// when the cache could not be purged. Documents the backend refuses are only reported.
    pub async fn replace<R: BufRead>(&self, splitter: &mut Splitter<R>, progress: &mut RefreshProgress) -> WebcalResult<ReplaceSummary> {
        match self.policy {
            PurgePolicy::Deferred => self.replace_deferred(splitter, progress).await,
            PurgePolicy::Eager => self.replace_eager(splitter, progress).await,
        }
    }

    async fn replace_deferred<R: BufRead>(&self, splitter: &mut Splitter<R>, progress: &mut RefreshProgress) -> WebcalResult<ReplaceSummary> {
        let mut summary = ReplaceSummary::default();

        // Objects sharing a UID are gathered into one document, wherever they are in the feed
        let mut documents: Vec<Document> = Vec::new();
        let mut by_uid: HashMap<String, usize> = HashMap::new();
        for document in splitter {
            let document = document?;
            let uid = match document.uid() {
                Some(uid) => uid.to_string(),
                None => {
                    progress.warn("Skipping a document that has no UID");
                    summary.skipped += 1;
                    continue;
                },
            };
            match by_uid.get(&uid).copied() {
                Some(index) => {
                    progress.debug(&format!("Merging a later part of {} into its document", uid));
                    documents[index].merge(document);
                },
                None => {
                    by_uid.insert(uid, documents.len());
                    documents.push(document);
                },
            }
        }

        let mut staged = Vec::new();
        for document in documents {
            if let Some(entry) = self.prepare(document, &mut summary, progress) {
                staged.push(entry);
            }
        }

        let n_staged = staged.len();
        progress.feedback(RefreshEvent::InProgress {
            subscription: self.subscription.id(),
            details: format!("caching {} documents", n_staged),
        });
        let rejected = self.backend.replace_cached_events(self.subscription.id(), staged).await?;
        for r in &rejected {
            progress.warn(&format!("Unable to cache {}: {}", r.uri, r.error));
        }

        summary.stored = n_staged - rejected.len();
        summary.rejected = rejected.into_iter().map(|r| r.uri).collect();
        Ok(summary)
    }

    async fn replace_eager<R: BufRead>(&self, splitter: &mut Splitter<R>, progress: &mut RefreshProgress) -> WebcalResult<ReplaceSummary> {
        let mut summary = ReplaceSummary::default();
        self.backend.purge_all_cached_events(self.subscription.id()).await?;
        progress.debug("Purged the cached events");

        for document in splitter {
            let document = document?;
            let (uri, data) = match self.prepare(document, &mut summary, progress) {
                None => continue,
                Some(entry) => entry,
            };

            match self.backend.add_cached_event(self.subscription.id(), &uri, &data).await {
                Ok(()) => summary.stored += 1,
                Err(err) => {
                    progress.warn(&format!("Unable to cache {}: {}", uri, err));
                    summary.rejected.push(uri);
                },
            }
        }
        Ok(summary)
    }

    /// Strip a document, and returns the `(uri, calendar data)` it should be cached as
    fn prepare(&self, mut document: Document, summary: &mut ReplaceSummary, progress: &mut RefreshProgress) -> Option<(String, String)> {
        let uid = match document.uid() {
            Some(uid) => uid.to_string(),
            None => {
                progress.warn("Skipping a document that has no UID");
                summary.skipped += 1;
                return None;
            },
        };

        if self.stripper.strip(&mut document) == false {
            progress.debug(&format!("Leaving out to-do {}", uid));
            summary.stripped += 1;
            return None;
        }

        Some((object_uri(&uid), document.serialize()))
    }
}
