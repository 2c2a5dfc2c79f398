//! This module refreshes webcal subscriptions
//!
//! A refresh downloads the feed of a subscription, splits it into single calendar objects,
//! strips what the subscriber does not want, and replaces the cached events with the result.
//! Changes the feed asks for (a permanent move, a suggested refresh rate) are committed to the subscription at the end.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::client::FeedClient;
use crate::duration::DurationInterval;
use crate::error::{WebcalError, WebcalResult};
use crate::ical::Splitter;
use crate::subscription::{MutationSet, Subscription};
use crate::traits::SubscriptionBackend;

pub mod negotiate;
pub mod progress;
use progress::{FeedbackSender, RefreshEvent, RefreshProgress};
pub mod replacer;
pub use replacer::{CacheReplacer, PurgePolicy, ReplaceSummary};


/// What a refresh did
#[derive(Clone, Debug, PartialEq)]
pub enum RefreshOutcome {
    /// There is no such subscription (anymore)
    SubscriptionMissing,
    /// The subscription has been refreshed recently enough
    NotDue,
    /// The storage could not be read or purged. The cache may be stale
    StorageFailure,
    /// The feed could not be downloaded. The cache has not been touched
    NetworkFailure,
    /// The feed is not valid iCal data
    ParseFailure,
    Refreshed(RefreshReport),
}

/// Details about a successful refresh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshReport {
    /// Documents now in the cache
    pub stored: usize,
    /// To-dos that have been left out
    pub stripped: usize,
    /// Documents without a UID
    pub skipped: usize,
    /// Uris the storage refused
    pub rejected: Vec<String>,
    /// Changes successfully committed to the subscription
    pub committed: MutationSet,
    /// Set when the changes could not be committed
    pub commit_error: Option<String>,
}


/// Refreshes the subscriptions stored in a [`SubscriptionBackend`]
pub struct Refresher<B: SubscriptionBackend> {
    backend: Arc<B>,
    client: FeedClient,
    policy: PurgePolicy,
}

impl<B: SubscriptionBackend> Refresher<B> {
    /// Create a refresher, that uses a default [`FeedClient`] and the [`PurgePolicy::Deferred`] policy
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            client: FeedClient::new(),
            policy: PurgePolicy::default(),
        }
    }

    pub fn with_client(mut self, client: FeedClient) -> Self {
        self.client = client;
        self
    }

    pub fn with_purge_policy(mut self, policy: PurgePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Whether a subscription is due for a refresh at `now`.
    ///
    /// A subscription whose stored refresh rate is invalid is never due.
    pub fn should_run(&self, subscription: &Subscription, now: DateTime<Utc>) -> bool {
        is_due(subscription, now)
    }

    /// Refresh a subscription if it is due, i.e. what a job scheduler should call.
    pub async fn execute(&self, principal_uri: &str, uri: &str, now: DateTime<Utc>) -> RefreshOutcome {
        let mut progress = RefreshProgress::new();
        self.execute_inner(principal_uri, uri, now, &mut progress).await
    }

    /// Same as [`Self::execute`], and provide feedback to the user about the progress.
    pub async fn execute_with_feedback(&self, principal_uri: &str, uri: &str, now: DateTime<Utc>, feedback_sender: FeedbackSender) -> RefreshOutcome {
        let mut progress = RefreshProgress::new_with_feedback_channel(feedback_sender);
        self.execute_inner(principal_uri, uri, now, &mut progress).await
    }

    /// Refresh a subscription, whether it is due or not.
    ///
    /// This never fails: errors are logged (using the `log::*` macros) and summed up in the returned outcome.
    /// Simply run it again later.
    pub async fn run(&self, principal_uri: &str, uri: &str) -> RefreshOutcome {
        let mut progress = RefreshProgress::new();
        self.run_inner(principal_uri, uri, &mut progress).await
    }

    /// Same as [`Self::run`], and provide feedback to the user about the progress.
    pub async fn run_with_feedback(&self, principal_uri: &str, uri: &str, feedback_sender: FeedbackSender) -> RefreshOutcome {
        let mut progress = RefreshProgress::new_with_feedback_channel(feedback_sender);
        self.run_inner(principal_uri, uri, &mut progress).await
    }

    async fn execute_inner(&self, principal_uri: &str, uri: &str, now: DateTime<Utc>, progress: &mut RefreshProgress) -> RefreshOutcome {
        let subscription = match self.resolve(principal_uri, uri, progress).await {
            Err(outcome) => return outcome,
            Ok(sub) => sub,
        };
        if self.should_run(&subscription, now) == false {
            progress.debug(&format!("Subscription {} is not due yet", subscription.id()));
            progress.feedback(RefreshEvent::Finished{ success: true });
            return RefreshOutcome::NotDue;
        }
        self.refresh(&subscription, progress).await
    }

    async fn run_inner(&self, principal_uri: &str, uri: &str, progress: &mut RefreshProgress) -> RefreshOutcome {
        let subscription = match self.resolve(principal_uri, uri, progress).await {
            Err(outcome) => return outcome,
            Ok(sub) => sub,
        };
        self.refresh(&subscription, progress).await
    }

    /// Look a subscription up. The `Err` variant holds the outcome the run should end with
    async fn resolve(&self, principal_uri: &str, uri: &str, progress: &mut RefreshProgress) -> Result<Subscription, RefreshOutcome> {
        let subscriptions = match self.backend.get_subscriptions_for_user(principal_uri).await {
            Ok(subs) => subs,
            Err(err) => {
                progress.error(&format!("Unable to list the subscriptions of {}: {}", principal_uri, err));
                progress.feedback(RefreshEvent::Finished{ success: false });
                return Err(RefreshOutcome::StorageFailure);
            },
        };

        match subscriptions.into_iter().find(|s| s.uri() == uri) {
            Some(sub) => Ok(sub),
            None => {
                progress.debug(&format!("{} has no subscription {}", principal_uri, uri));
                progress.feedback(RefreshEvent::Finished{ success: true });
                Err(RefreshOutcome::SubscriptionMissing)
            },
        }
    }

    /// Refresh an already resolved subscription
    pub async fn refresh(&self, subscription: &Subscription, progress: &mut RefreshProgress) -> RefreshOutcome {
        progress.set_subscription(subscription.id());
        progress.feedback(RefreshEvent::Started{ subscription: subscription.id() });

        let outcome = match self.refresh_inner(subscription, progress).await {
            Ok(report) => {
                progress.info(&format!("Refreshed: {} cached events", report.stored));
                RefreshOutcome::Refreshed(report)
            },
            Err(err @ WebcalError::Network(_)) => {
                progress.warn(&format!("Unable to fetch {}: {}", subscription.source(), err));
                RefreshOutcome::NetworkFailure
            },
            Err(err @ WebcalError::FeedParse(_)) => {
                progress.warn(&format!("The feed at {} is not valid iCal data: {}", subscription.source(), err));
                RefreshOutcome::ParseFailure
            },
            Err(err) => {
                progress.error(&format!("Unable to update the cache: {}", err));
                RefreshOutcome::StorageFailure
            },
        };

        progress.feedback(RefreshEvent::Finished{ success: progress.is_success() });
        outcome
    }

    async fn refresh_inner(&self, subscription: &Subscription, progress: &mut RefreshProgress) -> WebcalResult<RefreshReport> {
        let feed = self.client.fetch(subscription.source()).await?;

        let mut mutations = MutationSet::new();
        if let Some(location) = &feed.redirected_location {
            mutations.set_source(location);
        }

        let mut splitter = Splitter::open(feed.body.as_bytes())?;
        let summary = CacheReplacer::new(self.backend.as_ref(), subscription, self.policy)
            .replace(&mut splitter, progress)
            .await?;

        if let Some(rate) = negotiate::suggest(subscription, splitter.header()) {
            progress.debug(&format!("The feed suggests refreshing every {}", rate));
            mutations.set_refresh_rate(&rate);
        }

        let mut report = RefreshReport {
            stored: summary.stored,
            stripped: summary.stripped,
            skipped: summary.skipped,
            rejected: summary.rejected,
            ..RefreshReport::default()
        };

        if mutations.is_empty() == false {
            match self.backend.update_subscription(subscription.id(), &mutations).await {
                Ok(()) => report.committed = mutations,
                Err(err) => {
                    progress.warn(&format!("Unable to update the subscription properties: {}", err));
                    report.commit_error = Some(err.to_string());
                },
            }
        }

        Ok(report)
    }
}

/// Whether a subscription is due for a refresh at `now`
pub fn is_due(subscription: &Subscription, now: DateTime<Utc>) -> bool {
    let rate = subscription.effective_refresh_rate();
    let interval = match DurationInterval::parse(rate) {
        Ok(interval) => interval,
        Err(err) => {
            log::warn!("Subscription {} has an invalid refresh rate: {}", subscription.id(), err);
            return false;
        },
    };

    match subscription.last_run() {
        None => true,
        Some(last_run) => (now - last_run).num_seconds() > interval.as_seconds(),
    }
}
