//! Comparison of a single day against the pre-policy norm for its weekday.
//!
//! The baseline is the mean of per-day averages, not a pooled mean over raw
//! samples, so days with more samples weigh the same as sparse ones. Only
//! batch records form the baseline; the selected day draws on both streams.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

use crate::analyzers::aggregate::{Bucketing, RecordFilter, aggregate};
use crate::analyzers::utility::mean;
use crate::records::{CommuteRecord, Provenance, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Less,
    More,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Less => "less",
            Direction::More => "more",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineDifference {
    pub magnitude_minutes: u64,
    pub direction: Direction,
    pub difference: f64,
    pub baseline_average: f64,
    pub selected_average: f64,
    pub baseline_days: usize,
}

/// Difference between `selected_average` and the mean of
/// `baseline_daily_averages`. `None` if there are no baseline days.
pub fn difference(baseline_daily_averages: &[f64], selected_average: f64) -> Option<BaselineDifference> {
    let baseline_average = mean(baseline_daily_averages)?;
    let difference = selected_average - baseline_average;

    Some(BaselineDifference {
        magnitude_minutes: difference.abs().round() as u64,
        direction: if difference < 0.0 {
            Direction::Less
        } else {
            Direction::More
        },
        difference,
        baseline_average,
        selected_average,
        baseline_days: baseline_daily_averages.len(),
    })
}

/// Compares `date` on `route` with earlier same-weekday days.
///
/// Baseline days are batch records of `route` stamped before `policy_start`
/// whose weekday matches `date`. Returns `None` when either the selected day
/// or the baseline has no data.
pub fn baseline_difference(
    records: &[CommuteRecord],
    route: Route,
    date: NaiveDate,
    policy_start: NaiveDateTime,
) -> Option<BaselineDifference> {
    let weekday = chrono::Datelike::weekday(&date);
    let filter = RecordFilter::route(route).on_weekday(weekday);

    let baseline_days = aggregate(
        records
            .iter()
            .filter(|r| r.provenance() == Provenance::Batch && r.timestamp() < policy_start),
        &filter,
        Bucketing::CalendarDay,
    );
    let daily_averages: Vec<f64> = baseline_days
        .iter()
        .filter_map(|(_, bucket)| bucket.average())
        .collect();

    let selected = aggregate(
        records.iter().filter(|r| r.date() == date),
        &RecordFilter::route(route),
        Bucketing::CalendarDay,
    );
    let selected_average = selected.iter().find_map(|(_, bucket)| bucket.average())?;

    difference(&daily_averages, selected_average)
}

/// Plain-language rendering of a [`BaselineDifference`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommuteSentence {
    pub date: NaiveDate,
    pub route: Route,
    pub route_title: String,
    pub difference: BaselineDifference,
}

impl CommuteSentence {
    pub fn new(date: NaiveDate, route: Route, difference: BaselineDifference) -> Self {
        Self {
            date,
            route,
            route_title: route.title().to_string(),
            difference,
        }
    }
}

impl fmt::Display for CommuteSentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "On {} the commute on route {} ({}) was {} minutes {} than before the congestion toll.",
            self.date.format("%Y-%m-%d"),
            self.route,
            self.route_title,
            self.difference.magnitude_minutes,
            self.difference.direction,
        )
    }
}
