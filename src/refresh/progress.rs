//! Utilities to track the progression of a refresh

use std::fmt::{Display, Error, Formatter};

use crate::subscription::SubscriptionId;

/// An event that happens during a refresh
#[derive(Clone, Debug, PartialEq)]
pub enum RefreshEvent {
    /// Refresh has not started
    NotStarted,
    /// The subscription has been resolved and its feed is being downloaded
    Started { subscription: SubscriptionId },
    /// Documents are being cached
    InProgress { subscription: SubscriptionId, details: String },
    /// Refresh is finished
    Finished { success: bool },
}

impl Display for RefreshEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            RefreshEvent::NotStarted => write!(f, "Not started"),
            RefreshEvent::Started{subscription} => write!(f, "[{}] Refresh has started...", subscription),
            RefreshEvent::InProgress{subscription, details} => write!(f, "[{}] {}...", subscription, details),
            RefreshEvent::Finished{success} => match success {
                true => write!(f, "Refresh successfully finished"),
                false => write!(f, "Refresh finished with errors"),
            }
        }
    }
}

impl Default for RefreshEvent {
    fn default() -> Self {
        Self::NotStarted
    }
}


/// See [`feedback_channel`]
pub type FeedbackSender = tokio::sync::watch::Sender<RefreshEvent>;
/// See [`feedback_channel`]
pub type FeedbackReceiver = tokio::sync::watch::Receiver<RefreshEvent>;

/// Create a feeback channel, that can be used to retrieve the current progress of a refresh
pub fn feedback_channel() -> (FeedbackSender, FeedbackReceiver) {
    tokio::sync::watch::channel(RefreshEvent::default())
}


/// Tracks the progression, the warnings and the errors of one refresh.
///
/// Every message is prefixed with the subscription it is about, once it is known.
pub struct RefreshProgress {
    subscription: Option<SubscriptionId>,
    n_warnings: u32,
    n_errors: u32,
    feedback_channel: Option<FeedbackSender>,
}

impl RefreshProgress {
    pub fn new() -> Self {
        Self { subscription: None, n_warnings: 0, n_errors: 0, feedback_channel: None }
    }
    pub fn new_with_feedback_channel(channel: FeedbackSender) -> Self {
        Self { subscription: None, n_warnings: 0, n_errors: 0, feedback_channel: Some(channel) }
    }

    pub fn set_subscription(&mut self, id: SubscriptionId) {
        self.subscription = Some(id);
    }

    pub fn is_success(&self) -> bool {
        self.n_errors == 0
    }
    pub fn n_warnings(&self) -> u32 {
        self.n_warnings
    }

    fn prefixed(&self, text: &str) -> String {
        match self.subscription {
            Some(id) => format!("[{}] {}", id, text),
            None => text.to_string(),
        }
    }

    /// Log an error
    pub fn error(&mut self, text: &str) {
        log::error!("{}", self.prefixed(text));
        self.n_errors += 1;
    }
    /// Log a warning
    pub fn warn(&mut self, text: &str) {
        log::warn!("{}", self.prefixed(text));
        self.n_warnings += 1;
    }
    /// Log an info
    pub fn info(&mut self, text: &str) {
        log::info!("{}", self.prefixed(text));
    }
    /// Log a debug message
    pub fn debug(&mut self, text: &str) {
        log::debug!("{}", self.prefixed(text));
    }
    /// Send an event as a feedback to the listener (if any).
    pub fn feedback(&mut self, event: RefreshEvent) {
        if let Some(sender) = &self.feedback_channel {
            // Nobody listening is fine
            let _ = sender.send(event);
        }
    }
}

impl Default for RefreshProgress {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_feedback() {
        let (sender, receiver) = feedback_channel();
        let mut progress = RefreshProgress::new_with_feedback_channel(sender);
        let id = SubscriptionId::random();
        progress.set_subscription(id);

        progress.warn("something odd");
        assert!(progress.is_success());
        assert_eq!(progress.n_warnings(), 1);

        progress.feedback(RefreshEvent::Started { subscription: id });
        assert_eq!(*receiver.borrow(), RefreshEvent::Started { subscription: id });

        progress.error("something bad");
        assert_eq!(progress.is_success(), false);
    }
}
