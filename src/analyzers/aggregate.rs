use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::records::{CommuteRecord, Route};

/// Minutes between time-of-day slots in the standard profile.
pub const DEFAULT_SLOT_MINUTES: u32 = 15;

/// Day names indexed Sunday = 0 through Saturday = 6.
pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn weekday_name(day: Weekday) -> &'static str {
    DAY_NAMES[day.num_days_from_sunday() as usize]
}

/// Parses a full day name such as `"Monday"`, ignoring case.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    const ORDER: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];
    DAY_NAMES
        .iter()
        .position(|day| day.eq_ignore_ascii_case(name.trim()))
        .map(|index| ORDER[index])
}

/// Grouping key of an aggregation bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    /// Start of a time-of-day slot, shown as `HH:MM`.
    Slot(NaiveTime),
    /// A calendar day, shown as `YYYY-MM-DD`.
    Day(NaiveDate),
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Slot(time) => write!(f, "{}", time.format("%H:%M")),
            BucketKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How records are partitioned into buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucketing {
    /// Time of day, floored to a grid of `slot_minutes`.
    TimeOfDay { slot_minutes: u32 },
    CalendarDay,
}

impl Bucketing {
    pub fn time_of_day() -> Self {
        Bucketing::TimeOfDay {
            slot_minutes: DEFAULT_SLOT_MINUTES,
        }
    }

    pub fn key_for(&self, at: NaiveDateTime) -> BucketKey {
        match *self {
            Bucketing::TimeOfDay { slot_minutes } => {
                let slot = slot_minutes.max(1);
                let minute_of_day = at.hour() * 60 + at.minute();
                BucketKey::Slot(slot_start(minute_of_day / slot * slot))
            }
            Bucketing::CalendarDay => BucketKey::Day(at.date()),
        }
    }

    /// Every slot of the day for time-of-day bucketing; empty for calendar days.
    pub fn fixed_keys(&self) -> Vec<BucketKey> {
        match *self {
            Bucketing::TimeOfDay { slot_minutes } => {
                let slot = slot_minutes.max(1);
                (0..24 * 60)
                    .step_by(slot as usize)
                    .map(|minute| BucketKey::Slot(slot_start(minute)))
                    .collect()
            }
            Bucketing::CalendarDay => Vec::new(),
        }
    }
}

fn slot_start(minute_of_day: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minute_of_day / 60, minute_of_day % 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Running sum and count for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bucket {
    pub sum: f64,
    pub count: usize,
}

impl Bucket {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// `None` when the bucket never received a value.
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Selects which records take part in an aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    routes: Option<BTreeSet<Route>>,
    weekday: Option<Weekday>,
}

impl RecordFilter {
    /// Matches every record.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn route(route: Route) -> Self {
        Self::routes([route])
    }

    pub fn routes(routes: impl IntoIterator<Item = Route>) -> Self {
        Self {
            routes: Some(routes.into_iter().collect()),
            weekday: None,
        }
    }

    pub fn on_weekday(mut self, weekday: Weekday) -> Self {
        self.weekday = Some(weekday);
        self
    }

    pub fn matches(&self, record: &CommuteRecord) -> bool {
        let route_ok = self
            .routes
            .as_ref()
            .is_none_or(|routes| routes.contains(&record.route()));
        let day_ok = self
            .weekday
            .is_none_or(|day| weekday_name(record.weekday()) == weekday_name(day));
        route_ok && day_ok
    }
}

/// Buckets produced by [`aggregate`], ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregation {
    buckets: BTreeMap<BucketKey, Bucket>,
}

impl Aggregation {
    pub fn get(&self, key: &BucketKey) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &Bucket)> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of records that landed in any bucket.
    pub fn total_count(&self) -> usize {
        self.buckets.values().map(|b| b.count).sum()
    }

    pub fn averages(&self) -> BTreeMap<BucketKey, Option<f64>> {
        self.buckets
            .iter()
            .map(|(key, bucket)| (*key, bucket.average()))
            .collect()
    }

    pub fn average(&self, key: &BucketKey) -> Option<f64> {
        self.buckets.get(key).and_then(Bucket::average)
    }
}

/// Groups matching records into buckets and accumulates their durations.
///
/// For time-of-day bucketing every slot of the day is present in the result,
/// empty or not.
pub fn aggregate<'a>(
    records: impl IntoIterator<Item = &'a CommuteRecord>,
    filter: &RecordFilter,
    bucketing: Bucketing,
) -> Aggregation {
    let mut buckets: BTreeMap<BucketKey, Bucket> = bucketing
        .fixed_keys()
        .into_iter()
        .map(|key| (key, Bucket::default()))
        .collect();

    for record in records.into_iter().filter(|r| filter.matches(r)) {
        buckets
            .entry(bucketing.key_for(record.timestamp()))
            .or_default()
            .add(record.duration_minutes());
    }

    Aggregation { buckets }
}
