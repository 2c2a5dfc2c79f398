//! Error types for webcal mirroring.

use thiserror::Error;

use crate::subscription::SubscriptionId;

/// Errors that can occur while refreshing or serving a cached subscription.
#[derive(Error, Debug)]
pub enum WebcalError {
    #[error("Invalid refresh rate {0:?}")]
    InvalidRefreshRate(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Feed parse error: {0}")]
    FeedParse(String),

    #[error("Invalid cached event {uri:?}: {reason}")]
    InvalidEvent { uri: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not allowed: {0}")]
    NotAllowed(String),

    #[error("Unknown subscription {0}")]
    UnknownSubscription(SubscriptionId),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for WebcalError {
    fn from(err: reqwest::Error) -> Self {
        WebcalError::Network(err.to_string())
    }
}

/// Result type alias for webcal operations.
pub type WebcalResult<T> = Result<T, WebcalError>;
