//! Filters for calendar queries on cached subscriptions

use crate::ical::{Component, Splitter};
use crate::item::CachedEvent;


/// A condition on one property of the matched component
#[derive(Clone, Debug, PartialEq)]
pub enum PropTest {
    IsDefined,
    IsNotDefined,
    /// Case-insensitive substring match
    TextMatch { text: String, negate: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropFilter {
    pub name: String,
    pub test: PropTest,
}

/// Flags to tell which cached objects should be retrieved
///
/// An empty query matches every object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalendarQuery {
    /// Only match objects containing this component (`VEVENT`, `VTODO`...)
    pub component: Option<String>,
    /// Every filter must hold on the same component
    pub prop_filters: Vec<PropFilter>,
}

impl CalendarQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn component<S: ToString>(name: S) -> Self {
        Self { component: Some(name.to_string().to_ascii_uppercase()), prop_filters: Vec::new() }
    }

    pub fn with_prop_filter<S: ToString>(mut self, name: S, test: PropTest) -> Self {
        self.prop_filters.push(PropFilter { name: name.to_string().to_ascii_uppercase(), test });
        self
    }

    /// Whether a cached object matches this query
    pub fn matches(&self, event: &CachedEvent) -> bool {
        if self.component.is_none() && self.prop_filters.is_empty() {
            return true;
        }

        let mut splitter = match Splitter::open(event.calendar_data().as_bytes()) {
            Ok(s) => s,
            Err(err) => {
                log::warn!("Cached object {} cannot be parsed: {}", event.uri(), err);
                return false;
            },
        };

        splitter.any(|doc| match doc {
            Err(_) => false,
            Ok(doc) => doc.calendar().components.iter()
                .filter(|c| c.is_timezone() == false)
                .any(|c| self.matches_component(c)),
        })
    }

    fn matches_component(&self, component: &Component) -> bool {
        if let Some(name) = &self.component {
            if component.name != *name {
                return false;
            }
        }

        self.prop_filters.iter().all(|filter| {
            let prop = component.find_prop(&filter.name);
            match &filter.test {
                PropTest::IsDefined => prop.is_some(),
                PropTest::IsNotDefined => prop.is_none(),
                PropTest::TextMatch { text, negate } => {
                    let found = prop
                        .map(|p| p.value().to_lowercase().contains(&text.to_lowercase()))
                        .unwrap_or(false);
                    found != *negate
                },
            }
        })
    }
}
