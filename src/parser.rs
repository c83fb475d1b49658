//! Normalizes raw spreadsheet rows and document-store keys into
//! [`CommuteRecord`]s.
//!
//! Neither source carries a year, so one is inferred from the month through an
//! injectable [`YearTable`]. Rows that fail validation are skipped; the reason
//! is only ever logged.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use thiserror::Error;
use tracing::{debug, trace};

use crate::records::{CommuteRecord, Provenance, Route};

/// Durations at or above this many minutes are treated as measurement errors.
pub const DEFAULT_MAX_DURATION_MINUTES: f64 = 100.0;

/// Why a raw row was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("unparseable {field}: {value:?}")]
    Unparseable { field: &'static str, value: String },

    #[error("route {0} is not tracked")]
    UnknownRoute(String),

    #[error("no such date or time: month {month}, day {day}, {hour:02}:{minute:02}")]
    InvalidTimestamp {
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
    },

    #[error("duration {0} is outside the accepted range")]
    DurationOutOfRange(f64),
}

/// Month → year lookup used to complete `MM-DD` dates.
///
/// The collected data spans December 2024 and the months after it, so the
/// default maps December to 2024 and everything else to 2025. This only holds
/// for that window; data crossing another year boundary needs its own table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearTable {
    pub default_year: i32,
    #[serde(default)]
    pub months: BTreeMap<u32, i32>,
}

impl Default for YearTable {
    fn default() -> Self {
        Self {
            default_year: 2025,
            months: BTreeMap::from([(12, 2024)]),
        }
    }
}

impl YearTable {
    /// A table that returns `year` for every month.
    pub fn fixed(year: i32) -> Self {
        Self {
            default_year: year,
            months: BTreeMap::new(),
        }
    }

    pub fn with_month(mut self, month: u32, year: i32) -> Self {
        self.months.insert(month, year);
        self
    }

    /// Year for a 1-based month.
    pub fn year_for(&self, month: u32) -> i32 {
        self.months.get(&month).copied().unwrap_or(self.default_year)
    }
}

/// Turns raw rows from either source into validated records.
#[derive(Debug, Clone)]
pub struct Normalizer {
    years: YearTable,
    max_duration_minutes: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(YearTable::default(), DEFAULT_MAX_DURATION_MINUTES)
    }
}

impl Normalizer {
    pub fn new(years: YearTable, max_duration_minutes: f64) -> Self {
        Self {
            years,
            max_duration_minutes,
        }
    }

    pub fn years(&self) -> &YearTable {
        &self.years
    }

    /// Parses one spreadsheet row laid out as
    /// `[route, "MM-DD", exact time (ignored), "HH:MM", minutes, description?]`.
    pub fn batch_row(&self, row: &StringRecord) -> Result<CommuteRecord, RowError> {
        let route = parse_route(field(row, 0, "route")?)?;
        let (month, day) = split_pair(field(row, 1, "date")?, '-', "date")?;
        let (hour, minute) = split_pair(field(row, 3, "time block")?, ':', "time block")?;
        let duration = parse_duration(field(row, 4, "duration")?)?;

        self.build(route, month, day, hour, minute, duration, Provenance::Batch)
    }

    /// Parses a document-store entry keyed `"MM_DD_HH-MM"` within the
    /// collection of `route`.
    pub fn live_entry(
        &self,
        route: Route,
        key: &str,
        duration: Option<f64>,
    ) -> Result<CommuteRecord, RowError> {
        let mut parts = key.trim().split('_');
        let (Some(month), Some(day), Some(clock), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(RowError::Unparseable {
                field: "document key",
                value: key.to_string(),
            });
        };
        let month = parse_number(month, "month")?;
        let day = parse_number(day, "day")?;
        let (hour, minute) = split_pair(clock, '-', "document key time")?;
        let duration = duration.ok_or(RowError::MissingField("total_minutes"))?;

        self.build(route, month, day, hour, minute, duration, Provenance::Live)
    }

    /// Reads a spreadsheet export (header row first) and lazily yields the
    /// rows that pass validation.
    pub fn batch_rows<'a, R: Read + 'a>(
        &'a self,
        reader: R,
    ) -> impl Iterator<Item = CommuteRecord> + 'a {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        reader
            .into_records()
            .enumerate()
            .filter_map(move |(index, result)| {
                let row = match result {
                    Ok(row) => row,
                    Err(e) => {
                        debug!(row = index + 1, error = %e, "Unreadable spreadsheet row skipped");
                        return None;
                    }
                };
                match self.batch_row(&row) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        trace!(row = index + 1, error = %e, "Invalid spreadsheet row skipped");
                        None
                    }
                }
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        route: Route,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        duration: f64,
        provenance: Provenance,
    ) -> Result<CommuteRecord, RowError> {
        if !duration.is_finite() || duration < 0.0 || duration >= self.max_duration_minutes {
            return Err(RowError::DurationOutOfRange(duration));
        }

        let year = self.years.year_for(month);
        let invalid = || RowError::InvalidTimestamp {
            month,
            day,
            hour,
            minute,
        };
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)?;

        Ok(CommuteRecord::new(
            route,
            NaiveDateTime::new(date, time),
            duration,
            provenance,
        ))
    }
}

fn field<'a>(row: &'a StringRecord, index: usize, name: &'static str) -> Result<&'a str, RowError> {
    match row.get(index).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(RowError::MissingField(name)),
    }
}

fn parse_number(value: &str, field: &'static str) -> Result<u32, RowError> {
    value.trim().parse().map_err(|_| RowError::Unparseable {
        field,
        value: value.to_string(),
    })
}

fn split_pair(value: &str, separator: char, field: &'static str) -> Result<(u32, u32), RowError> {
    let (left, right) = value
        .split_once(separator)
        .ok_or_else(|| RowError::Unparseable {
            field,
            value: value.to_string(),
        })?;
    Ok((parse_number(left, field)?, parse_number(right, field)?))
}

fn parse_route(value: &str) -> Result<Route, RowError> {
    value
        .parse::<u8>()
        .ok()
        .and_then(Route::new)
        .ok_or_else(|| RowError::UnknownRoute(value.to_string()))
}

fn parse_duration(value: &str) -> Result<f64, RowError> {
    value.parse().map_err(|_| RowError::Unparseable {
        field: "duration",
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn row(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_year_table_default_splits_december() {
        let years = YearTable::default();
        assert_eq!(years.year_for(12), 2024);
        assert_eq!(years.year_for(1), 2025);
        assert_eq!(years.year_for(2), 2025);
    }

    #[test]
    fn test_year_table_is_injectable() {
        let years = YearTable::fixed(2030).with_month(11, 2029);
        assert_eq!(years.year_for(11), 2029);
        assert_eq!(years.year_for(12), 2030);
    }

    #[test]
    fn test_batch_row_valid() {
        let normalizer = Normalizer::default();
        let record = normalizer
            .batch_row(&row(&["3", "12-08", "12-08-18-15-14", "18:15", "43", "via Park Ave"]))
            .unwrap();

        assert_eq!(record.route().id(), 3);
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2024, 12, 8).unwrap());
        assert_eq!(record.timestamp().hour(), 18);
        assert_eq!(record.timestamp().minute(), 15);
        assert_eq!(record.duration_minutes(), 43.0);
        assert_eq!(record.provenance(), Provenance::Batch);
    }

    #[test]
    fn test_batch_row_without_description() {
        let normalizer = Normalizer::default();
        let record = normalizer
            .batch_row(&row(&["1", "01-06", "", "7:00", "21.5"]))
            .unwrap();
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        assert_eq!(record.timestamp().hour(), 7);
    }

    #[test]
    fn test_batch_row_rejects_bad_duration() {
        let normalizer = Normalizer::default();
        let result = normalizer.batch_row(&row(&["1", "01-06", "", "07:00", "abc"]));
        assert!(matches!(result, Err(RowError::Unparseable { field: "duration", .. })));

        let result = normalizer.batch_row(&row(&["1", "01-06", "", "07:00", "100"]));
        assert_eq!(result, Err(RowError::DurationOutOfRange(100.0)));

        let result = normalizer.batch_row(&row(&["1", "01-06", "", "07:00", "-1"]));
        assert_eq!(result, Err(RowError::DurationOutOfRange(-1.0)));
    }

    #[test]
    fn test_batch_row_rejects_missing_time() {
        let normalizer = Normalizer::default();
        let result = normalizer.batch_row(&row(&["1", "01-06", "x", "", "20"]));
        assert_eq!(result, Err(RowError::MissingField("time block")));

        let result = normalizer.batch_row(&row(&["1", "01-06"]));
        assert_eq!(result, Err(RowError::MissingField("time block")));
    }

    #[test]
    fn test_batch_row_rejects_unknown_route_and_impossible_date() {
        let normalizer = Normalizer::default();
        let result = normalizer.batch_row(&row(&["20", "01-06", "", "07:00", "20"]));
        assert_eq!(result, Err(RowError::UnknownRoute("20".into())));

        let result = normalizer.batch_row(&row(&["1", "02-30", "", "07:00", "20"]));
        assert!(matches!(result, Err(RowError::InvalidTimestamp { .. })));

        let result = normalizer.batch_row(&row(&["1", "01-06", "", "25:00", "20"]));
        assert!(matches!(result, Err(RowError::InvalidTimestamp { .. })));
    }

    #[test]
    fn test_live_entry_valid() {
        let normalizer = Normalizer::default();
        let route = Route::new(16).unwrap();
        let record = normalizer
            .live_entry(route, "12_29_05-15", Some(12.0))
            .unwrap();

        assert_eq!(
            record.timestamp(),
            NaiveDate::from_ymd_opt(2024, 12, 29)
                .unwrap()
                .and_hms_opt(5, 15, 0)
                .unwrap()
        );
        assert_eq!(record.provenance(), Provenance::Live);
        assert_eq!(record.route(), route);
    }

    #[test]
    fn test_live_entry_rejects_malformed_keys() {
        let normalizer = Normalizer::default();
        let route = Route::new(1).unwrap();
        for key in ["12-29_05-15", "12_29", "12_29_0515", "12_29_05-15_x", "aa_29_05-15"] {
            assert!(
                normalizer.live_entry(route, key, Some(10.0)).is_err(),
                "{key} should be rejected"
            );
        }
        assert_eq!(
            normalizer.live_entry(route, "12_29_05-15", None),
            Err(RowError::MissingField("total_minutes"))
        );
    }

    #[test]
    fn test_batch_rows_skips_header_and_invalid_rows() {
        let csv = "route,date,exact,time,minutes,path\n\
                   1,12-08,x,18:15,43,via Park\n\
                   1,12-08,x,18:30,abc,via Park\n\
                   1,12-08,x,,40,via Park\n\
                   2,12-08,x,18:30,150\n\
                   2,12-09,x,08:00,30\n";
        let normalizer = Normalizer::default();
        let records: Vec<_> = normalizer.batch_rows(csv.as_bytes()).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].duration_minutes(), 43.0);
        assert_eq!(records[1].route().id(), 2);
    }

    #[test]
    fn test_batch_rows_is_repeatable() {
        let csv = "route,date,exact,time,minutes\n1,12-08,x,18:15,43\n4,01-10,x,09:45,22\n";
        let normalizer = Normalizer::default();
        let first: Vec<_> = normalizer.batch_rows(csv.as_bytes()).collect();
        let second: Vec<_> = normalizer.batch_rows(csv.as_bytes()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_batch_rows_from_owned_and_borrowed_readers() {
        let csv = String::from("route,date,exact,time,minutes\n3,12-10,x,07:30,25\n");
        let normalizer = Normalizer::default();

        let borrowed: Vec<_> = normalizer.batch_rows(csv.as_bytes()).collect();
        let owned: Vec<_> = normalizer
            .batch_rows(std::io::Cursor::new(csv.clone().into_bytes()))
            .collect();

        assert_eq!(borrowed.len(), 1);
        assert_eq!(borrowed, owned);
    }
}
