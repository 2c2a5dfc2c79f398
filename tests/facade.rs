//! Serving cached subscriptions as read-only collections

use std::path::Path;
use std::sync::Arc;

use webcal_fridge::cache::Cache;
use webcal_fridge::cached_subscription::{CachedSubscription, Privilege};
use webcal_fridge::config::DISPLAY_NAME_PROPERTY;
use webcal_fridge::query::PropTest;
use webcal_fridge::traits::SubscriptionBackend;
use webcal_fridge::{CalendarQuery, MutationSet, Subscription, WebcalError};

const PRINCIPAL: &str = "principals/users/alice";

fn calendar_data(uid: &str, kind: &str, summary: &str) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:{kind}\r\nUID:{uid}\r\nSUMMARY:{summary}\r\nEND:{kind}\r\nEND:VCALENDAR\r\n",
        kind = kind, uid = uid, summary = summary,
    )
}

async fn populate() -> (Arc<Cache>, CachedSubscription<Cache>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let cache = Cache::new(Path::new("unused"));
    let sub = Subscription::new(PRINCIPAL, "holidays", "https://example.com/holidays.ics");
    cache.add_subscription(sub.clone()).unwrap();
    cache.add_cached_event(sub.id(), "xmas.ics", &calendar_data("xmas", "VEVENT", "Christmas")).await.unwrap();
    cache.add_cached_event(sub.id(), "nye.ics", &calendar_data("nye", "VEVENT", "New year's eve")).await.unwrap();
    cache.add_cached_event(sub.id(), "gifts.ics", &calendar_data("gifts", "VJOURNAL", "Gift ideas")).await.unwrap();

    let cache = Arc::new(cache);
    let facade = CachedSubscription::new(Arc::clone(&cache), sub);
    (cache, facade)
}

#[tokio::test]
async fn test_read_path() {
    let (_cache, facade) = populate().await;

    let children = facade.get_children().await.unwrap();
    assert_eq!(children.len(), 3);

    let xmas = facade.get_child("xmas.ics").await.unwrap();
    assert!(xmas.calendar_data().contains("SUMMARY:Christmas"));
    assert!(xmas.etag().as_str().starts_with('"'));

    assert!(matches!(facade.get_child("easter.ics").await, Err(WebcalError::NotFound(_))));
    assert!(facade.child_exists("nye.ics").await.unwrap());
    assert_eq!(facade.child_exists("easter.ics").await.unwrap(), false);

    let names = vec!["nye.ics".to_string(), "easter.ics".to_string(), "xmas.ics".to_string()];
    let some: Vec<String> = facade.get_multiple_children(&names).await.unwrap()
        .iter().map(|e| e.uri().to_string()).collect();
    assert_eq!(some, vec!["nye.ics".to_string(), "xmas.ics".to_string()]);
}

#[tokio::test]
async fn test_calendar_query() {
    let (_cache, facade) = populate().await;

    let mut everything = facade.calendar_query(&CalendarQuery::all()).await.unwrap();
    everything.sort();
    assert_eq!(everything, vec!["gifts.ics".to_string(), "nye.ics".to_string(), "xmas.ics".to_string()]);

    let mut events = facade.calendar_query(&CalendarQuery::component("VEVENT")).await.unwrap();
    events.sort();
    assert_eq!(events, vec!["nye.ics".to_string(), "xmas.ics".to_string()]);

    let query = CalendarQuery::component("VEVENT")
        .with_prop_filter("SUMMARY", PropTest::TextMatch { text: "christmas".to_string(), negate: false });
    assert_eq!(facade.calendar_query(&query).await.unwrap(), vec!["xmas.ics".to_string()]);
}

#[tokio::test]
async fn test_writes_are_refused() {
    let (cache, facade) = populate().await;
    let data = calendar_data("easter", "VEVENT", "Easter");

    assert!(matches!(facade.create_file("easter.ics", &data), Err(WebcalError::NotAllowed(_))));
    assert!(matches!(facade.put_child("xmas.ics", &data), Err(WebcalError::NotAllowed(_))));
    assert!(matches!(facade.delete_child("xmas.ics"), Err(WebcalError::NotAllowed(_))));
    assert_eq!(facade.sync_token(), None);

    assert_eq!(cache.get_cached_objects(facade.subscription().id()).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_acl() {
    let (_cache, facade) = populate().await;
    let acl = facade.acl();
    assert_eq!(acl.len(), 1);
    assert_eq!(acl[0].principal, PRINCIPAL);
    assert_eq!(acl[0].privilege, Privilege::Read);
    assert!(acl[0].protected);
}

#[tokio::test]
async fn test_collection_changes() {
    let (cache, facade) = populate().await;
    let id = facade.subscription().id();

    let mut mutations = MutationSet::new();
    mutations.set(DISPLAY_NAME_PROPERTY, "Public holidays");
    facade.prop_patch(&mutations).await.unwrap();
    assert_eq!(cache.get_subscription(id).unwrap().display_name(), Some("Public holidays"));

    facade.delete().await.unwrap();
    assert!(cache.get_subscription(id).is_none());
    assert!(cache.get_cached_objects(id).await.unwrap().is_empty());
    assert!(cache.get_subscriptions_for_user(PRINCIPAL).await.unwrap().is_empty());
}
