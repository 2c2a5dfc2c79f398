//! Removal of the parts of a feed a subscriber does not want cached

use crate::subscription::StripFlags;
use super::{Document, ATTACH, VALARM, VTODO};

/// Strips alarms and attachments out of documents, and tells which documents must not be cached at all
#[derive(Clone, Copy, Debug)]
pub struct ContentStripper {
    flags: StripFlags,
}

impl ContentStripper {
    pub fn new(flags: StripFlags) -> Self {
        Self { flags }
    }

    /// Strip `document` in place. Returns `false` if the whole document must be discarded.
    pub fn strip(&self, document: &mut Document) -> bool {
        for component in document.calendar_mut().components.iter_mut() {
            if component.is_timezone() {
                continue;
            }
            if self.flags.contains(StripFlags::ALARMS) {
                component.remove_components(VALARM);
            }
            if self.flags.contains(StripFlags::ATTACHMENTS) {
                component.remove_props(ATTACH);
            }
        }

        if self.flags.contains(StripFlags::TODOS) && document.component_type() == Some(VTODO) {
            return false;
        }
        true
    }
}
