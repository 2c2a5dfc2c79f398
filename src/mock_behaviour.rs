//! This module provides ways to tweak the local [`Cache`](crate::cache::Cache), so that it can return errors on some tests

use crate::error::{WebcalError, WebcalResult};

/// This stores some behaviour tweaks, that describe how a mocked instance will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    pub get_subscriptions_behaviour: (u32, u32),
    pub update_subscription_behaviour: (u32, u32),
    pub purge_behaviour: (u32, u32),
    pub add_cached_event_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All actions will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            get_subscriptions_behaviour: (0, n_fails),
            update_subscription_behaviour: (0, n_fails),
            purge_behaviour: (0, n_fails),
            add_cached_event_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_get_subscriptions(&mut self) -> WebcalResult<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.get_subscriptions_behaviour, "get_subscriptions")
    }
    pub fn can_update_subscription(&mut self) -> WebcalResult<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.update_subscription_behaviour, "update_subscription")
    }
    pub fn can_purge(&mut self) -> WebcalResult<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.purge_behaviour, "purge")
    }
    pub fn can_add_cached_event(&mut self) -> WebcalResult<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.add_cached_event_behaviour, "add_cached_event")
    }
}


/// Spend one of the remaining successes, or else one of the remaining failures.
/// Once both are exhausted, everything is allowed again
fn decrement(value: &mut (u32, u32), descr: &str) -> WebcalResult<()> {
    match *value {
        (0, 0) => Ok(()),
        (0, failures) => {
            value.1 = failures - 1;
            log::debug!("Mock behaviour: {} fails ({} more failures to come)", descr, value.1);
            Err(WebcalError::Backend(format!("Mocked behaviour requires {} to fail this time", descr)))
        },
        (successes, _) => {
            value.0 = successes - 1;
            log::debug!("Mock behaviour: {} succeeds ({} more successes before failing)", descr, value.0);
            Ok(())
        },
    }
}
