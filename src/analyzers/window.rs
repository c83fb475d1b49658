//! Partitioning of records and series at cutover boundaries.
//!
//! Every boundary is inclusive on its start side: a value stamped exactly at
//! a boundary belongs to the window that begins there.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analyzers::types::{TimedValue, start_of_day};
use crate::records::{CommuteRecord, Provenance};

/// A named point in time where one window ends and the next begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub name: String,
    pub at: NaiveDateTime,
}

impl Boundary {
    pub fn new(name: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            at,
        }
    }
}

/// A half-open span `[start, end)` and the values that fell in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Window {
    pub name: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub values: Vec<TimedValue>,
}

impl Window {
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at < end)
    }
}

/// Whether a record falls inside the span its source is responsible for.
///
/// Batch records cover everything before `cutover`, live records cover
/// `cutover` onward.
pub fn within_source_window(record: &CommuteRecord, cutover: NaiveDateTime) -> bool {
    match record.provenance() {
        Provenance::Batch => record.timestamp() < cutover,
        Provenance::Live => record.timestamp() >= cutover,
    }
}

/// Merges both streams, keeping each record only inside its source's span.
pub fn scope_sources(
    records: impl IntoIterator<Item = CommuteRecord>,
    cutover: NaiveDateTime,
) -> Vec<CommuteRecord> {
    records
        .into_iter()
        .filter(|r| within_source_window(r, cutover))
        .collect()
}

/// Splits `values` into `boundaries.len() + 1` disjoint windows.
///
/// The first window is named `before <first boundary>`; each later window
/// takes the name of the boundary that opens it. Input order is kept within
/// each window.
pub fn split_at(values: &[TimedValue], boundaries: &[Boundary]) -> Vec<Window> {
    let mut sorted: Vec<&Boundary> = boundaries.iter().collect();
    sorted.sort_by_key(|b| b.at);

    let mut windows = Vec::with_capacity(sorted.len() + 1);
    windows.push(Window {
        name: match sorted.first() {
            Some(first) => format!("before {}", first.name),
            None => "all".to_string(),
        },
        start: None,
        end: sorted.first().map(|b| b.at),
        values: Vec::new(),
    });
    for (index, boundary) in sorted.iter().enumerate() {
        windows.push(Window {
            name: boundary.name.clone(),
            start: Some(boundary.at),
            end: sorted.get(index + 1).map(|b| b.at),
            values: Vec::new(),
        });
    }

    for value in values {
        let index = sorted.partition_point(|b| b.at <= value.at);
        windows[index].values.push(*value);
    }

    windows
}

/// Groups values into one window per calendar day.
pub fn split_daily(values: &[TimedValue]) -> Vec<Window> {
    let mut days: BTreeMap<NaiveDate, Vec<TimedValue>> = BTreeMap::new();
    for value in values {
        days.entry(value.at.date()).or_default().push(*value);
    }

    days.into_iter()
        .map(|(date, values)| Window {
            name: date.format("%Y-%m-%d").to_string(),
            start: Some(start_of_day(date)),
            end: date.succ_opt().map(start_of_day),
            values,
        })
        .collect()
}
