//! This module handles splitting, filtering and re-serializing iCal feeds
//!
//! Feeds are kept as a generic component tree rather than typed events, so that every
//! property a publisher sends survives the round trip into the cache.
//! Content lines are read with the `ical` crate, and written back with the `ics` crate.

mod parser;
pub use parser::{Document, Splitter};
mod builder;
pub use builder::build_from;
mod strip;
pub use strip::ContentStripper;

pub const VCALENDAR: &str = "VCALENDAR";
pub const VTIMEZONE: &str = "VTIMEZONE";
pub const VTODO: &str = "VTODO";
pub const VALARM: &str = "VALARM";
pub const ATTACH: &str = "ATTACH";


/// One content line: `NAME;PARAM=VALUE:value`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Property {
    pub name: String,
    pub params: Vec<(String, Vec<String>)>,
    pub value: Option<String>,
}

impl Property {
    pub fn new<N: ToString, V: ToString>(name: N, value: V) -> Self {
        Self {
            name: name.to_string().to_ascii_uppercase(),
            params: Vec::new(),
            value: Some(value.to_string()),
        }
    }

    /// The value, or an empty string
    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

impl From<ical::property::Property> for Property {
    fn from(prop: ical::property::Property) -> Self {
        Self {
            name: prop.name.trim_start_matches('\u{feff}').to_ascii_uppercase(),
            params: prop.params.unwrap_or_default(),
            value: prop.value,
        }
    }
}


/// A `BEGIN:NAME` ... `END:NAME` block, with its properties and nested blocks
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Component {
    pub name: String,
    pub properties: Vec<Property>,
    pub components: Vec<Component>,
}

impl Component {
    pub fn new<N: ToString>(name: N) -> Self {
        Self {
            name: name.to_string().to_ascii_uppercase(),
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Returns the first property with this name
    pub fn find_prop(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// The UID of this component, if it has a non-empty one
    pub fn uid(&self) -> Option<&str> {
        self.find_prop("UID")
            .map(|p| p.value().trim())
            .filter(|uid| uid.is_empty() == false)
    }

    pub fn is_timezone(&self) -> bool {
        self.name == VTIMEZONE
    }

    /// Remove every property with this name. Returns how many were removed
    pub fn remove_props(&mut self, name: &str) -> usize {
        let before = self.properties.len();
        self.properties.retain(|p| p.name.eq_ignore_ascii_case(name) == false);
        before - self.properties.len()
    }

    /// Remove every direct sub-component with this name. Returns how many were removed
    pub fn remove_components(&mut self, name: &str) -> usize {
        let before = self.components.len();
        self.components.retain(|c| c.name.eq_ignore_ascii_case(name) == false);
        before - self.components.len()
    }
}
