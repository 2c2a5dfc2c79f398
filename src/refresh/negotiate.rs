//! Refresh rates suggested by the feeds themselves

use crate::duration::DurationInterval;
use crate::ical::Property;
use crate::subscription::Subscription;

const PUBLISHED_TTL: &str = "X-PUBLISHED-TTL";
const REFRESH_INTERVAL: &str = "REFRESH-INTERVAL";

/// Returns the refresh rate the feed suggests, if the subscription has none yet.
///
/// `header` are the VCALENDAR-level properties of the feed. `REFRESH-INTERVAL` wins over `X-PUBLISHED-TTL`.
/// A suggestion that is not a valid duration is discarded.
pub fn suggest(subscription: &Subscription, header: &[Property]) -> Option<String> {
    if subscription.refresh_rate().is_some() {
        return None;
    }

    let value_of = |name: &str| header.iter()
        .find(|p| p.name == name)
        .and_then(|p| p.value.as_deref())
        .map(|v| v.trim().to_string());
    let candidate = value_of(REFRESH_INTERVAL).or_else(|| value_of(PUBLISHED_TTL));

    let candidate = candidate?;
    match DurationInterval::parse(&candidate) {
        Ok(_) => Some(candidate),
        Err(err) => {
            log::debug!("Ignoring refresh rate suggested by the feed of {}: {}", subscription.id(), err);
            None
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str, value: &str) -> Property {
        Property::new(name, value)
    }

    fn subscription() -> Subscription {
        Subscription::new("principals/users/alice", "holidays", "https://example.com/h.ics")
    }

    #[test]
    fn test_refresh_interval_wins() {
        let header = vec![prop("REFRESH-INTERVAL", "PT2H"), prop("X-PUBLISHED-TTL", "PT1H")];
        assert_eq!(suggest(&subscription(), &header), Some("PT2H".to_string()));

        let header = vec![prop("X-PUBLISHED-TTL", "PT1H"), prop("REFRESH-INTERVAL", "PT2H")];
        assert_eq!(suggest(&subscription(), &header), Some("PT2H".to_string()));
    }

    #[test]
    fn test_published_ttl_only() {
        let header = vec![prop("VERSION", "2.0"), prop("X-PUBLISHED-TTL", "PT1H")];
        assert_eq!(suggest(&subscription(), &header), Some("PT1H".to_string()));
    }

    #[test]
    fn test_no_suggestion() {
        assert_eq!(suggest(&subscription(), &[prop("VERSION", "2.0")]), None);

        let header = vec![prop("X-PUBLISHED-TTL", "every now and then")];
        assert_eq!(suggest(&subscription(), &header), None);

        let configured = subscription().with_refresh_rate(Some("P1D"));
        assert_eq!(suggest(&configured, &[prop("X-PUBLISHED-TTL", "PT1H")]), None);
    }
}
