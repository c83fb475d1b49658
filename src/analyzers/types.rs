//! Data types shared by the aggregation pipeline.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::records::Route;

/// A numeric sample, `x` usually being epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A value anchored at a naive local timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedValue {
    pub at: NaiveDateTime,
    pub value: f64,
}

impl TimedValue {
    /// Converts to a [`Point`] with `x` in epoch milliseconds, treating the
    /// naive timestamp as if it were UTC.
    pub fn to_point(self) -> Point {
        Point::new(epoch_millis(self.at) as f64, self.value)
    }
}

/// Epoch milliseconds of a naive timestamp read as UTC.
pub fn epoch_millis(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp_millis()
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// A named set of routes charted as one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteGroup {
    pub name: String,
    pub routes: BTreeSet<Route>,
}

impl RouteGroup {
    pub fn new(name: impl Into<String>, routes: impl IntoIterator<Item = Route>) -> Self {
        Self {
            name: name.into(),
            routes: routes.into_iter().collect(),
        }
    }

    /// Routes inside, or leading into, the congestion zone.
    pub fn congestion_zone() -> Self {
        Self::new("Congestion zone", (1..=13).filter_map(Route::new))
    }

    /// Boston and Chicago control routes.
    pub fn control_cities() -> Self {
        Self::new("Control cities", [16, 18].into_iter().filter_map(Route::new))
    }
}

/// Average commute for one time-of-day slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotAverage {
    pub slot: String,
    pub average: Option<f64>,
}

/// Average commute for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    /// Epoch milliseconds of midnight, for datetime chart axes.
    pub x: i64,
    pub average: Option<f64>,
}

impl DailyPoint {
    pub fn new(date: NaiveDate, average: Option<f64>) -> Self {
        Self {
            date,
            x: epoch_millis(start_of_day(date)),
            average,
        }
    }
}

/// A straight trend segment fitted over one window of a daily series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSegment {
    pub window: String,
    pub slope: f64,
    pub intercept: f64,
    pub points: [Point; 2],
}
