//! A module to build ICal files

use ics::components::{Component as IcsComponent, Parameter, Property as IcsProperty};

use super::{Component, Document, Property};

/// Serialize a split document into iCal text (CRLF line endings, lines folded at 75 octets)
pub fn build_from(document: &Document) -> String {
    to_ics(document.calendar()).to_string()
}

fn to_ics(component: &Component) -> IcsComponent<'_> {
    let mut built = IcsComponent::new(component.name.as_str());
    for prop in &component.properties {
        built.add_property(to_ics_property(prop));
    }
    for child in &component.components {
        built.add_component(to_ics(child));
    }
    built
}

fn to_ics_property(prop: &Property) -> IcsProperty<'_> {
    let mut built = IcsProperty::new(prop.name.as_str(), prop.value());
    for (key, values) in &prop.params {
        let value = values.iter()
            .map(|v| quote_param_value(v))
            .collect::<Vec<_>>()
            .join(",");
        built.add(Parameter::new(key.as_str(), value));
    }
    built
}

/// Parameter values containing separators must be quoted
fn quote_param_value(value: &str) -> String {
    if value.contains(|c| c == ':' || c == ';' || c == ',') {
        format!("\"{}\"", value.trim_matches('"'))
    } else {
        value.to_string()
    }
}
