//! This module provides a client to download webcal feeds

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::header::USER_AGENT;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use url::Url;

use crate::config;
use crate::error::{WebcalError, WebcalResult};


/// What a fetch learnt about the redirects it went through.
/// It lives for one fetch only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RedirectState {
    /// Whether a response other than a `301 Moved Permanently` has been seen
    pub broken: bool,
    /// Where the chain of permanent redirects pointed to, as long as it is not broken
    pub location: Option<Url>,
}

impl RedirectState {
    /// Record one redirect response, whose target is `target`
    pub fn observe_redirect(&mut self, status: StatusCode, target: &Url) {
        if self.broken {
            return;
        }
        if status == StatusCode::MOVED_PERMANENTLY {
            self.location = Some(target.clone());
        } else {
            self.broken = true;
            self.location = None;
        }
    }

    /// Record the last response. It is not a redirect, so it can only end the chain
    pub fn observe_final(&mut self) {
        self.broken = true;
    }
}


/// A downloaded feed
#[derive(Clone, Debug)]
pub struct FetchedFeed {
    pub body: String,
    /// Set when the feed has permanently moved
    pub redirected_location: Option<Url>,
}


/// Downloads webcal feeds over HTTP
#[derive(Clone, Debug)]
pub struct FeedClient {
    user_agent: String,
    timeout: Duration,
}

impl Default for FeedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedClient {
    /// Create a client with the settings from [`config`](crate::config). This does not start a connection
    pub fn new() -> Self {
        Self {
            user_agent: config::user_agent(),
            timeout: config::request_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent<S: ToString>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// GET a feed, following redirects
    pub async fn fetch(&self, source: &str) -> WebcalResult<FetchedFeed> {
        let url = normalize_source(source)?;
        let state = Arc::new(Mutex::new(RedirectState::default()));

        let hook_state = Arc::clone(&state);
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() > config::MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            match hook_state.lock() {
                Ok(mut s) => s.observe_redirect(attempt.status(), attempt.url()),
                Err(poisoned) => poisoned.into_inner().observe_redirect(attempt.status(), attempt.url()),
            }
            attempt.follow()
        });

        let client = reqwest::Client::builder()
            .redirect(policy)
            .timeout(self.timeout)
            .build()?;

        log::debug!("Fetching {}", url);
        let res = client
            .get(url.as_str())
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await?
            .error_for_status()?;
        let body = res.text().await?;

        let mut state = match state.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        state.observe_final();
        if let Some(location) = &state.location {
            log::info!("{} has permanently moved to {}", url, location);
        }

        Ok(FetchedFeed {
            body,
            redirected_location: state.location,
        })
    }
}

/// Parse a subscription source. `webcal://` and `webcals://` feeds are fetched over https
pub fn normalize_source(source: &str) -> WebcalResult<Url> {
    let source = source.trim();
    let lower = source.to_ascii_lowercase();
    let rewritten = if lower.starts_with("webcal://") {
        format!("https://{}", &source["webcal://".len()..])
    } else if lower.starts_with("webcals://") {
        format!("https://{}", &source["webcals://".len()..])
    } else {
        source.to_string()
    };

    let url = Url::parse(&rewritten)
        .map_err(|err| WebcalError::Network(format!("Invalid source {:?}: {}", source, err)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WebcalError::Network(format!("Unsupported scheme {} in {}", other, source))),
    }
}
