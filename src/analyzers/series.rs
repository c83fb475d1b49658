//! Chart-ready views built from the aggregation primitives.

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::aggregate::{BucketKey, Bucketing, RecordFilter, aggregate, weekday_name};
use crate::analyzers::trend::fit_line;
use crate::analyzers::types::{DailyPoint, RouteGroup, SlotAverage, TimedValue, TrendSegment, start_of_day};
use crate::analyzers::window::{Boundary, split_at};
use crate::records::{CommuteRecord, Route};

/// Average commute by time of day for one route and weekday: across every
/// date, and separately before and after the policy start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeOfDayProfile {
    pub route: Route,
    pub route_title: String,
    pub weekday: String,
    pub all: Vec<SlotAverage>,
    pub before: Vec<SlotAverage>,
    pub after: Vec<SlotAverage>,
}

pub fn time_of_day_profile(
    records: &[CommuteRecord],
    route: Route,
    weekday: Weekday,
    policy_start: NaiveDateTime,
    slot_minutes: u32,
) -> TimeOfDayProfile {
    let filter = RecordFilter::route(route).on_weekday(weekday);
    let bucketing = Bucketing::TimeOfDay { slot_minutes };
    let all = slot_averages(records.iter().collect(), &filter, bucketing);
    let (before, after): (Vec<&CommuteRecord>, Vec<&CommuteRecord>) = records
        .iter()
        .partition(|r| r.timestamp() < policy_start);

    TimeOfDayProfile {
        route,
        route_title: route.title().to_string(),
        weekday: weekday_name(weekday).to_string(),
        all,
        before: slot_averages(before, &filter, bucketing),
        after: slot_averages(after, &filter, bucketing),
    }
}

fn slot_averages(
    records: Vec<&CommuteRecord>,
    filter: &RecordFilter,
    bucketing: Bucketing,
) -> Vec<SlotAverage> {
    aggregate(records, filter, bucketing)
        .iter()
        .map(|(key, bucket)| SlotAverage {
            slot: key.to_string(),
            average: bucket.average(),
        })
        .collect()
}

/// Per-day averages of one route group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    pub name: String,
    pub points: Vec<DailyPoint>,
}

impl DailySeries {
    /// Days that have data, as timestamped values at midnight.
    pub fn timed_values(&self) -> Vec<TimedValue> {
        self.points
            .iter()
            .filter_map(|p| {
                p.average.map(|value| TimedValue {
                    at: start_of_day(p.date),
                    value,
                })
            })
            .collect()
    }
}

/// Daily averages for several route groups over a shared day axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyComparison {
    pub days: Vec<NaiveDate>,
    pub series: Vec<DailySeries>,
}

/// Averages every group per calendar day. The day axis is the union of days
/// seen by any group; a group without data on a day gets `None` there.
pub fn daily_comparison(records: &[CommuteRecord], groups: &[RouteGroup]) -> DailyComparison {
    let per_group: Vec<BTreeMap<NaiveDate, Option<f64>>> = groups
        .iter()
        .map(|group| {
            aggregate(
                records,
                &RecordFilter::routes(group.routes.iter().copied()),
                Bucketing::CalendarDay,
            )
            .averages()
            .into_iter()
            .filter_map(|(key, average)| match key {
                BucketKey::Day(date) => Some((date, average)),
                BucketKey::Slot(_) => None,
            })
            .collect()
        })
        .collect();

    let days: BTreeSet<NaiveDate> = per_group.iter().flat_map(|m| m.keys().copied()).collect();
    let days: Vec<NaiveDate> = days.into_iter().collect();

    let series = groups
        .iter()
        .zip(&per_group)
        .map(|(group, averages)| DailySeries {
            name: group.name.clone(),
            points: days
                .iter()
                .map(|day| DailyPoint::new(*day, averages.get(day).copied().flatten()))
                .collect(),
        })
        .collect();

    DailyComparison { days, series }
}

/// A daily series with trend segments fitted on each side of the split
/// boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub name: String,
    pub points: Vec<DailyPoint>,
    pub trends: Vec<TrendSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendOverlay {
    pub boundaries: Vec<Boundary>,
    pub series: Vec<TrendSeries>,
}

/// Builds the daily comparison for the groups not in `hidden` and fits one
/// trend segment per window. Windows with fewer than two days of data get no
/// segment.
pub fn trend_overlay(
    records: &[CommuteRecord],
    groups: &[RouteGroup],
    boundaries: &[Boundary],
    hidden: &BTreeSet<String>,
) -> TrendOverlay {
    let visible: Vec<RouteGroup> = groups
        .iter()
        .filter(|g| !hidden.contains(&g.name))
        .cloned()
        .collect();
    let comparison = daily_comparison(records, &visible);

    let series = comparison
        .series
        .into_iter()
        .map(|daily| {
            let trends = split_at(&daily.timed_values(), boundaries)
                .into_iter()
                .filter_map(|window| {
                    let points: Vec<_> = window.values.iter().map(|v| v.to_point()).collect();
                    let line = fit_line(&points)?;
                    Some(TrendSegment {
                        window: window.name,
                        slope: line.slope,
                        intercept: line.intercept,
                        points: line.segment(),
                    })
                })
                .collect();
            TrendSeries {
                name: daily.name,
                points: daily.points,
                trends,
            }
        })
        .collect();

    TrendOverlay {
        boundaries: boundaries.to_vec(),
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Provenance;

    fn ts(month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        let year = if month == 12 { 2024 } else { 2025 };
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn record(route: u8, at: NaiveDateTime, minutes: f64) -> CommuteRecord {
        CommuteRecord::new(Route::new(route).unwrap(), at, minutes, Provenance::Batch)
    }

    fn groups() -> Vec<RouteGroup> {
        vec![RouteGroup::congestion_zone(), RouteGroup::control_cities()]
    }

    #[test]
    fn test_time_of_day_profile_splits_at_policy_start() {
        // Mondays: 2024-12-30 before, 2025-01-06 after.
        let records = vec![
            record(1, ts(12, 30, 8, 0), 20.0),
            record(1, ts(12, 30, 8, 15), 22.0),
            record(1, ts(1, 6, 8, 0), 30.0),
            record(1, ts(1, 7, 8, 0), 99.0),
        ];
        let profile = time_of_day_profile(
            &records,
            Route::new(1).unwrap(),
            Weekday::Mon,
            ts(1, 5, 0, 0),
            15,
        );

        assert_eq!(profile.weekday, "Monday");
        assert_eq!(profile.before.len(), 96);
        assert_eq!(profile.after.len(), 96);
        let eight = 8 * 4;
        assert_eq!(profile.before[eight].slot, "08:00");
        assert_eq!(profile.before[eight].average, Some(20.0));
        assert_eq!(profile.before[eight + 1].average, Some(22.0));
        assert_eq!(profile.after[eight].average, Some(30.0));
        assert_eq!(profile.after[eight + 1].average, None);

        assert_eq!(profile.all.len(), 96);
        assert_eq!(profile.all[eight].average, Some(25.0));
        assert_eq!(profile.all[eight + 1].average, Some(22.0));
        assert_eq!(profile.all[eight + 2].average, None);
    }

    #[test]
    fn test_daily_comparison_fills_missing_days_with_none() {
        let records = vec![
            record(1, ts(12, 9, 8, 0), 20.0),
            record(2, ts(12, 9, 9, 0), 40.0),
            record(16, ts(12, 10, 8, 0), 12.0),
            record(15, ts(12, 9, 8, 0), 77.0),
        ];
        let comparison = daily_comparison(&records, &groups());

        assert_eq!(comparison.days.len(), 2);
        let zone = &comparison.series[0];
        assert_eq!(zone.points[0].average, Some(30.0));
        assert_eq!(zone.points[1].average, None);
        let control = &comparison.series[1];
        assert_eq!(control.points[0].average, None);
        assert_eq!(control.points[1].average, Some(12.0));
        assert_eq!(zone.timed_values().len(), 1);
    }

    #[test]
    fn test_trend_overlay_fits_each_window() {
        let policy = Boundary::new("policy start", ts(1, 5, 0, 0));
        let records = vec![
            record(1, ts(1, 2, 8, 0), 10.0),
            record(1, ts(1, 3, 8, 0), 12.0),
            record(1, ts(1, 4, 8, 0), 14.0),
            record(1, ts(1, 5, 8, 0), 30.0),
            record(1, ts(1, 6, 8, 0), 28.0),
            record(16, ts(1, 6, 8, 0), 9.0),
        ];
        let overlay = trend_overlay(&records, &groups(), &[policy], &BTreeSet::new());

        let zone = &overlay.series[0];
        assert_eq!(zone.trends.len(), 2);
        assert_eq!(zone.trends[0].window, "before policy start");
        assert!(zone.trends[0].slope > 0.0);
        assert_eq!(zone.trends[1].window, "policy start");
        assert!(zone.trends[1].slope < 0.0);

        // One day of control data: points but no line.
        let control = &overlay.series[1];
        assert!(control.trends.is_empty());
        assert!(control.points.iter().any(|p| p.average == Some(9.0)));
    }

    #[test]
    fn test_trend_overlay_omits_hidden_groups() {
        let records = vec![record(1, ts(1, 2, 8, 0), 10.0)];
        let hidden = BTreeSet::from(["Control cities".to_string()]);
        let overlay = trend_overlay(&records, &groups(), &[], &hidden);

        assert_eq!(overlay.series.len(), 1);
        assert_eq!(overlay.series[0].name, "Congestion zone");
    }
}
