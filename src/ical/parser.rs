//! A module to split iCal feeds into single calendar objects

use std::io::BufRead;

use ical::PropertyParser;

use crate::error::{WebcalError, WebcalResult};
use super::{Component, Property, VCALENDAR, VTIMEZONE};


/// One calendar object split out of a feed: a VCALENDAR wrapping a single event, to-do or journal
/// (possibly with its recurrence overrides), along with the timezones of the feed.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    calendar: Component,
}

impl Document {
    pub fn calendar(&self) -> &Component {
        &self.calendar
    }

    pub fn calendar_mut(&mut self) -> &mut Component {
        &mut self.calendar
    }

    /// UID of the last non-timezone component
    pub fn uid(&self) -> Option<&str> {
        self.last_object().and_then(|c| c.uid())
    }

    /// Name of the last non-timezone component (`VEVENT`, `VTODO`...)
    pub fn component_type(&self) -> Option<&str> {
        self.last_object().map(|c| c.name.as_str())
    }

    fn last_object(&self) -> Option<&Component> {
        self.calendar.components.iter()
            .filter(|c| c.is_timezone() == false)
            .last()
    }

    /// Serialize this document back to iCal text
    pub fn serialize(&self) -> String {
        super::build_from(self)
    }

    /// Move the objects of `other` (e.g. recurrence overrides met later in the feed) into this document.
    /// Timezones this document does not have yet are added too.
    pub fn merge(&mut self, other: Document) {
        let first_object = self.calendar.components.iter()
            .position(|c| c.is_timezone() == false)
            .unwrap_or(self.calendar.components.len());

        let mut new_timezones = Vec::new();
        let mut objects = Vec::new();
        for component in other.calendar.components {
            if component.is_timezone() == false {
                objects.push(component);
                continue;
            }
            let tzid = component.find_prop("TZID").map(|p| p.value().to_string());
            let known = self.calendar.components.iter()
                .filter(|c| c.is_timezone())
                .any(|c| c.find_prop("TZID").map(|p| p.value().to_string()) == tzid);
            if known == false {
                new_timezones.push(component);
            }
        }

        let tail = self.calendar.components.split_off(first_object);
        self.calendar.components.extend(new_timezones);
        self.calendar.components.extend(tail);
        self.calendar.components.extend(objects);
    }
}


/// Lazily splits an iCal feed into [`Document`]s, one top-level object at a time.
///
/// Parsing is lenient: content lines that cannot be parsed are skipped. Broken framing
/// (no leading `BEGIN:VCALENDAR`, an `END` that does not match its `BEGIN`, a feed that ends
/// inside a component) is a [`WebcalError::FeedParse`], after which the splitter yields nothing more.
///
/// Components sharing a UID that follow each other (a recurring event and its overrides)
/// end up in the same document. Timezones are attached to every document that comes after them.
pub struct Splitter<B: BufRead> {
    lines: PropertyParser<B>,
    /// Calendar-level properties of the first VCALENDAR of the feed
    feed_properties: Vec<Property>,
    /// Calendar-level properties of the VCALENDAR being read
    current_properties: Vec<Property>,
    timezones: Vec<Component>,
    lookahead: Option<Component>,
    /// An error met while reading ahead, reported after the document that was being completed
    pending_error: Option<WebcalError>,
    in_calendar: bool,
    n_calendars: usize,
    finished: bool,
}

impl<B: BufRead> Splitter<B> {
    /// Start reading a feed. This fails if the feed does not look like iCal data at all.
    pub fn open(reader: B) -> WebcalResult<Self> {
        let mut splitter = Self {
            lines: PropertyParser::from_reader(reader),
            feed_properties: Vec::new(),
            current_properties: Vec::new(),
            timezones: Vec::new(),
            lookahead: None,
            pending_error: None,
            in_calendar: false,
            n_calendars: 0,
            finished: false,
        };

        match splitter.next_property()? {
            Some(prop) if is_begin(&prop, VCALENDAR) => {
                splitter.in_calendar = true;
                splitter.n_calendars = 1;
            },
            Some(prop) => {
                return Err(WebcalError::FeedParse(format!("expected BEGIN:VCALENDAR, found {}", prop.name)));
            },
            None => return Err(WebcalError::FeedParse("empty feed".to_string())),
        }

        // Read the calendar properties, up to the first object
        splitter.lookahead = splitter.next_component()?;
        Ok(splitter)
    }

    /// Calendar-level properties of the feed (e.g. `X-PUBLISHED-TTL`) that have been read so far
    pub fn header(&self) -> &[Property] {
        &self.feed_properties
    }

    /// Returns the next non-timezone component, reading through calendar-level properties and timezones.
    fn next_component(&mut self) -> WebcalResult<Option<Component>> {
        loop {
            let prop = match self.next_property()? {
                Some(prop) => prop,
                None => {
                    if self.in_calendar {
                        return Err(WebcalError::FeedParse("feed ended before END:VCALENDAR".to_string()));
                    }
                    return Ok(None);
                },
            };

            if self.in_calendar == false {
                if is_begin(&prop, VCALENDAR) {
                    log::debug!("Feed contains another VCALENDAR");
                    self.in_calendar = true;
                    self.n_calendars += 1;
                    self.current_properties.clear();
                    self.timezones.clear();
                } else {
                    log::debug!("Ignoring {} found outside of any VCALENDAR", prop.name);
                }
                continue;
            }

            if prop.name == "BEGIN" {
                let name = component_name(&prop)?;
                let component = self.read_component(name)?;
                if component.name == VTIMEZONE {
                    self.timezones.push(component);
                    continue;
                }
                return Ok(Some(component));
            }

            if prop.name == "END" {
                let name = component_name(&prop)?;
                if name != VCALENDAR {
                    return Err(WebcalError::FeedParse(format!("unexpected END:{} in VCALENDAR", name)));
                }
                self.in_calendar = false;
                continue;
            }

            if self.n_calendars == 1 {
                self.feed_properties.push(prop.clone());
            }
            self.current_properties.push(prop);
        }
    }

    /// Reads a component whose `BEGIN` line has just been consumed
    fn read_component(&mut self, name: String) -> WebcalResult<Component> {
        let mut component = Component::new(&name);
        loop {
            let prop = match self.next_property()? {
                Some(prop) => prop,
                None => return Err(WebcalError::FeedParse(format!("feed ended inside {}", name))),
            };

            if prop.name == "BEGIN" {
                let child_name = component_name(&prop)?;
                let child = self.read_component(child_name)?;
                component.components.push(child);
            } else if prop.name == "END" {
                let end_name = component_name(&prop)?;
                if end_name != name {
                    return Err(WebcalError::FeedParse(format!("END:{} does not match BEGIN:{}", end_name, name)));
                }
                return Ok(component);
            } else {
                component.properties.push(prop);
            }
        }
    }

    fn next_property(&mut self) -> WebcalResult<Option<Property>> {
        loop {
            match self.lines.next() {
                None => return Ok(None),
                Some(Err(err)) => {
                    log::debug!("Skipping a malformed content line: {}", err);
                    continue;
                },
                Some(Ok(prop)) => return Ok(Some(Property::from(prop))),
            }
        }
    }

    fn next_document(&mut self) -> WebcalResult<Option<Document>> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }

        let first = match self.lookahead.take() {
            Some(c) => c,
            None => match self.next_component()? {
                Some(c) => c,
                None => return Ok(None),
            },
        };

        let uid = first.uid().map(String::from);
        let mut objects = vec![first];

        if uid.is_some() {
            loop {
                match self.next_component() {
                    Ok(Some(next)) if next.uid() == uid.as_deref() => objects.push(next),
                    Ok(Some(next)) => {
                        self.lookahead = Some(next);
                        break;
                    },
                    Ok(None) => break,
                    Err(err) => {
                        self.pending_error = Some(err);
                        break;
                    },
                }
            }
        }

        let mut calendar = Component::new(VCALENDAR);
        calendar.properties = self.current_properties.iter()
            .filter(|p| p.name != "METHOD")
            .cloned()
            .collect();
        calendar.components = self.timezones.clone();
        calendar.components.extend(objects);

        Ok(Some(Document { calendar }))
    }
}

impl<B: BufRead> Iterator for Splitter<B> {
    type Item = WebcalResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_document() {
            Ok(Some(doc)) => Some(Ok(doc)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            },
        }
    }
}

fn is_begin(prop: &Property, name: &str) -> bool {
    prop.name == "BEGIN" && prop.value().trim().eq_ignore_ascii_case(name)
}

fn component_name(prop: &Property) -> WebcalResult<String> {
    let name = prop.value().trim();
    if name.is_empty() {
        return Err(WebcalError::FeedParse(format!("{} without a component name", prop.name)));
    }
    Ok(name.to_ascii_uppercase())
}


#[cfg(test)]
mod test {
    use super::*;

    const EXAMPLE_FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Example Corp//Holidays//EN\r\n\
METHOD:PUBLISH\r\n\
X-PUBLISHED-TTL:PT1H\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Europe/Paris\r\n\
BEGIN:STANDARD\r\n\
DTSTART:19701025T030000\r\n\
TZOFFSETFROM:+0200\r\n\
TZOFFSETTO:+0100\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
UID:new-year\r\n\
DTSTART;VALUE=DATE:20250101\r\n\
SUMMARY:New year\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:weekly\r\n\
DTSTART;TZID=Europe/Paris:20250106T100000\r\n\
RRULE:FREQ=WEEKLY\r\n\
SUMMARY:Weekly\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:weekly\r\n\
RECURRENCE-ID;TZID=Europe/Paris:20250113T100000\r\n\
DTSTART;TZID=Europe/Paris:20250113T110000\r\n\
SUMMARY:Weekly (moved)\r\n\
END:VEVENT\r\n\
BEGIN:VTODO\r\n\
UID:todo-1\r\n\
SUMMARY:Buy a calendar\r\n\
END:VTODO\r\n\
END:VCALENDAR\r\n";

    fn split(feed: &str) -> Vec<WebcalResult<Document>> {
        Splitter::open(feed.as_bytes()).unwrap().collect()
    }

    #[test]
    fn test_split_feed() {
        let docs: Vec<Document> = split(EXAMPLE_FEED).into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), 3);

        assert_eq!(docs[0].uid(), Some("new-year"));
        assert_eq!(docs[0].component_type(), Some("VEVENT"));
        assert_eq!(docs[1].uid(), Some("weekly"));
        assert_eq!(docs[2].uid(), Some("todo-1"));
        assert_eq!(docs[2].component_type(), Some("VTODO"));

        // The recurrence override travels with its master
        let weekly = docs[1].calendar();
        assert_eq!(weekly.components.iter().filter(|c| c.name == "VEVENT").count(), 2);
    }

    #[test]
    fn test_documents_carry_timezones_but_not_method() {
        let docs: Vec<Document> = split(EXAMPLE_FEED).into_iter().map(|d| d.unwrap()).collect();
        for doc in &docs {
            let cal = doc.calendar();
            assert_eq!(cal.name, "VCALENDAR");
            assert!(cal.find_prop("VERSION").is_some());
            assert!(cal.find_prop("METHOD").is_none());
            assert_eq!(cal.components[0].name, "VTIMEZONE");
            assert_eq!(cal.components[0].components[0].name, "STANDARD");
        }
    }

    #[test]
    fn test_header_is_exposed() {
        let splitter = Splitter::open(EXAMPLE_FEED.as_bytes()).unwrap();
        let ttl = splitter.header().iter().find(|p| p.name == "X-PUBLISHED-TTL").unwrap();
        assert_eq!(ttl.value(), "PT1H");
    }

    #[test]
    fn test_not_a_calendar() {
        assert!(Splitter::open("".as_bytes()).is_err());
        assert!(Splitter::open("<html><body>Not found</body></html>\r\n".as_bytes()).is_err());
        assert!(Splitter::open("BEGIN:VCARD\r\nFN:John\r\nEND:VCARD\r\n".as_bytes()).is_err());
    }

    #[test]
    fn test_broken_framing_mid_stream() {
        let feed = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:first\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:second\r\n\
END:VTODO\r\n\
BEGIN:VEVENT\r\n\
UID:third\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let results = split(feed);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().uid(), Some("first"));
        assert!(matches!(results[1], Err(WebcalError::FeedParse(_))));
    }

    #[test]
    fn test_truncated_feed() {
        let feed = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:first\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nUID:cut\r\n";
        let results = split(feed);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_document_without_uid() {
        let feed = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
SUMMARY:No UID here\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
        let docs: Vec<Document> = split(feed).into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].uid(), None);
    }

    #[test]
    fn test_concatenated_calendars() {
        let feed = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:a\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n\
BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VJOURNAL\r\n\
UID:b\r\n\
END:VJOURNAL\r\n\
END:VCALENDAR\r\n";
        let docs: Vec<Document> = split(feed).into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].component_type(), Some("VJOURNAL"));
    }

    #[test]
    fn test_merge_distant_overrides() {
        let feed = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:a\r\n\
RRULE:FREQ=DAILY\r\n\
END:VEVENT\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Europe/Paris\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
UID:b\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:a\r\n\
RECURRENCE-ID;TZID=Europe/Paris:20250102T100000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let mut docs: Vec<Document> = split(feed).into_iter().map(|d| d.unwrap()).collect();
        let uids: Vec<&str> = docs.iter().map(|d| d.uid().unwrap()).collect();
        assert_eq!(uids, vec!["a", "b", "a"]);

        let late_override = docs.pop().unwrap();
        let mut master = docs.remove(0);
        master.merge(late_override);

        let names: Vec<&str> = master.calendar().components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["VTIMEZONE", "VEVENT", "VEVENT"]);
        assert_eq!(master.uid(), Some("a"));
        assert!(master.calendar().components[2].find_prop("RECURRENCE-ID").is_some());
    }
}
