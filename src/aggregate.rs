use std::collections::HashMap;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, VariantNames};
use tracing::debug;

use crate::calendar::CalendarEvent;
use crate::window::TimeWindow;

/// Event field used as the grouping key.
#[derive(
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
    Debug,
    Default,
    PartialEq,
    Clone,
    Copy,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    #[strum(to_string = "summary", serialize = "title")]
    #[serde(alias = "title")]
    Summary,
    Description,
    Location,
    Categories,
}

impl GroupBy {
    pub fn key<'a>(&self, event: &'a CalendarEvent) -> Option<&'a str> {
        match self {
            GroupBy::Summary => Some(event.title.as_str()),
            GroupBy::Description => event.description.as_deref(),
            GroupBy::Location => event.location.as_deref(),
            GroupBy::Categories => event.categories.as_deref(),
        }
    }
}

/// Accumulated time per group, kept in the order groups are first seen.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct DurationByGroup {
    groups: Vec<(String, Duration)>,
    index: HashMap<String, usize>,
}

impl DurationByGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, duration: Duration) {
        match self.index.get(key) {
            Some(&i) => self.groups[i].1 = self.groups[i].1 + duration,
            None => {
                self.index.insert(key.to_string(), self.groups.len());
                self.groups.push((key.to_string(), duration));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Duration> {
        self.index.get(key).map(|&i| self.groups[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.groups.iter().map(|(k, d)| (k.as_str(), *d))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub fn to_hours(duration: Duration) -> Decimal {
    Decimal::from(duration.num_seconds()) / Decimal::from(3600)
}

/// Sum the part of every event that falls inside `window`, per group.
pub fn aggregate(
    events: &[CalendarEvent],
    window: &TimeWindow,
    group_by: GroupBy,
) -> DurationByGroup {
    let mut durations = DurationByGroup::new();
    for event in events {
        let Some((start, end)) = window.clip(event.start, event.end) else {
            continue;
        };
        let Some(key) = group_by.key(event) else {
            debug!(title = %event.title, %group_by, "event has no grouping field");
            continue;
        };
        durations.add(key, end - start);
    }
    durations
}
