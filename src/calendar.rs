use chrono::{Duration, NaiveDateTime, NaiveTime};
use icalendar::{
    Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime,
    Event, EventLike,
};

use crate::error::CalendarError;

#[derive(Debug, PartialEq, Clone)]
pub struct CalendarEvent {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub description: Option<String>,
    pub location: Option<String>,
    pub categories: Option<String>,
}

impl CalendarEvent {
    pub fn new(title: &str, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            title: title.to_string(),
            start,
            end,
            description: None,
            location: None,
            categories: None,
        }
    }

    fn from_ical(event: &Event) -> Result<Self, CalendarError> {
        let name = || event.get_uid().unwrap_or("<no uid>").to_string();

        let title = event.get_summary().ok_or_else(|| {
            CalendarError::MissingProperty {
                property: "SUMMARY",
                event: name(),
            }
        })?;
        let start = timestamp(event, "DTSTART", event.get_start())?
            .ok_or_else(|| CalendarError::MissingProperty {
                property: "DTSTART",
                event: name(),
            })?;
        let end = match timestamp(event, "DTEND", event.get_end())? {
            Some(end) => end,
            None => {
                let value = event.property_value("DURATION").ok_or_else(|| {
                    CalendarError::MissingProperty {
                        property: "DTEND",
                        event: name(),
                    }
                })?;
                let duration = parse_duration(value).ok_or_else(|| {
                    CalendarError::Duration {
                        value: value.to_string(),
                        event: name(),
                    }
                })?;
                start + duration
            }
        };

        Ok(Self {
            description: event.get_description().map(String::from),
            location: event.get_location().map(String::from),
            categories: categories(event),
            ..Self::new(title, start, end)
        })
    }
}

/// Reads every VEVENT of an iCalendar document, other components are ignored.
pub fn parse_calendar(raw: &str) -> Result<Vec<CalendarEvent>, CalendarError> {
    let calendar: Calendar = raw.parse().map_err(|e| CalendarError::Parse {
        reason: format!("{}", e),
    })?;

    calendar
        .components
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(event) => Some(event),
            _ => None,
        })
        .map(CalendarEvent::from_ical)
        .collect()
}

// CATEGORIES may repeat, so the parser files it with the multi-properties.
fn categories(event: &Event) -> Option<String> {
    let values: Vec<&str> = event
        .multi_properties()
        .get("CATEGORIES")
        .map(|props| props.iter().map(|p| p.value()).collect())
        .unwrap_or_default();
    if values.is_empty() {
        event.property_value("CATEGORIES").map(String::from)
    } else {
        Some(values.join(","))
    }
}

/// `parsed` is `None` both when the property is absent and when it is invalid.
fn timestamp(
    event: &Event,
    key: &'static str,
    parsed: Option<DatePerhapsTime>,
) -> Result<Option<NaiveDateTime>, CalendarError> {
    match (parsed, event.property_value(key)) {
        (Some(value), _) => Ok(Some(wall_clock(value))),
        (None, None) => Ok(None),
        (None, Some(value)) => Err(CalendarError::Timestamp {
            property: key,
            value: value.to_string(),
            event: event.get_uid().unwrap_or("<no uid>").to_string(),
        }),
    }
}

// TZID parameters and the UTC marker are dropped, times are kept as written.
fn wall_clock(value: DatePerhapsTime) -> NaiveDateTime {
    match value {
        DatePerhapsTime::Date(date) => date.and_time(NaiveTime::MIN),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(date_time)) => {
            date_time
        }
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(date_time)) => {
            date_time.naive_utc()
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone {
            date_time,
            ..
        }) => date_time,
    }
}

/// RFC 5545 durations such as `PT1H30M`, `P1DT2H` or `P2W`.
fn parse_duration(value: &str) -> Option<Duration> {
    iso8601::duration(value.trim())
        .ok()
        .and_then(|iso| Duration::from_std(iso.into()).ok())
}
