//! Support for library configuration options

use std::sync::{Arc, Mutex};
use std::time::Duration;
use once_cell::sync::Lazy;

/// The `User-Agent` header sent when fetching a feed.
/// Feel free to override it when initing this library.
pub static USER_AGENT: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("webcal-fridge Webcal Crawler".to_string())));

/// Overall deadline for one feed request, redirects included.
/// Feel free to override it when initing this library.
pub static REQUEST_TIMEOUT: Lazy<Arc<Mutex<Duration>>> = Lazy::new(|| Arc::new(Mutex::new(Duration::from_secs(30))));

/// Refresh rate used when a subscription does not store one (once a week)
pub const DEFAULT_REFRESH_RATE: &str = "P1W";

/// How many redirects the transport follows before giving up
pub const MAX_REDIRECTS: usize = 10;

/// Subscription property holding the remote URL. Updated when a feed permanently moved.
pub const SOURCE_PROPERTY: &str = "{http://calendarserver.org/ns/}source";
/// Subscription property holding the refresh rate (an iCalendar duration)
pub const REFRESH_RATE_PROPERTY: &str = "{http://apple.com/ns/ical/}refreshrate";
pub const DISPLAY_NAME_PROPERTY: &str = "{DAV:}displayname";
pub const CALENDAR_COLOR_PROPERTY: &str = "{http://apple.com/ns/ical/}calendar-color";
pub const CALENDAR_ORDER_PROPERTY: &str = "{http://apple.com/ns/ical/}calendar-order";
pub const STRIP_TODOS_PROPERTY: &str = "{http://calendarserver.org/ns/}subscribed-strip-todos";
pub const STRIP_ALARMS_PROPERTY: &str = "{http://calendarserver.org/ns/}subscribed-strip-alarms";
pub const STRIP_ATTACHMENTS_PROPERTY: &str = "{http://calendarserver.org/ns/}subscribed-strip-attachments";

/// Returns the current user agent
pub fn user_agent() -> String {
    match USER_AGENT.lock() {
        Ok(ua) => ua.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Returns the current request deadline
pub fn request_timeout() -> Duration {
    match REQUEST_TIMEOUT.lock() {
        Ok(timeout) => *timeout,
        Err(poisoned) => *poisoned.into_inner(),
    }
}
