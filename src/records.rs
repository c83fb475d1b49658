//! Normalized commute records and the fixed route catalog.

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a route sits relative to the congestion zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Inside the zone or on a direct path into it.
    CongestionZone,
    /// Inside New York City but excluded from, or outside, the tolled zone.
    Excluded,
    /// Control route in another city.
    ControlCity,
}

/// A tracked route, numbered 1 through 19.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Route(u8);

impl Route {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 19;

    pub fn new(id: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&id).then_some(Self(id))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    /// Every route, in ascending order.
    pub fn all() -> impl Iterator<Item = Route> {
        (Self::MIN..=Self::MAX).map(Route)
    }

    pub fn class(self) -> RouteClass {
        match self.0 {
            1..=13 => RouteClass::CongestionZone,
            16 | 18 => RouteClass::ControlCity,
            _ => RouteClass::Excluded,
        }
    }

    pub fn title(self) -> &'static str {
        match self.0 {
            14 => "FDR Drive",
            15 => "New York City, outside the zone (15)",
            16 => "Boston control route",
            17 => "New York City, outside the zone (17)",
            18 => "Chicago control route",
            19 => "New York City, outside the zone (19)",
            n => CONGESTION_ZONE_TITLES[(n - 1) as usize],
        }
    }
}

const CONGESTION_ZONE_TITLES: [&str; 13] = [
    "Congestion zone route 1",
    "Congestion zone route 2",
    "Congestion zone route 3",
    "Congestion zone route 4",
    "Congestion zone route 5",
    "Congestion zone route 6",
    "Congestion zone route 7",
    "Congestion zone route 8",
    "Congestion zone route 9",
    "Congestion zone route 10",
    "Congestion zone route 11",
    "Congestion zone route 12",
    "Congestion zone route 13",
];

impl TryFrom<u8> for Route {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Route::new(id).ok_or_else(|| format!("route {id} is outside 1..=19"))
    }
}

impl From<Route> for u8 {
    fn from(route: Route) -> Self {
        route.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which upstream stream produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Bulk spreadsheet export.
    Batch,
    /// Incrementally updated document store.
    Live,
}

/// A single validated travel-time measurement.
///
/// Records are never mutated after construction. Two records for the same
/// route and timestamp are both kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommuteRecord {
    route: Route,
    timestamp: NaiveDateTime,
    duration_minutes: f64,
    provenance: Provenance,
}

impl CommuteRecord {
    pub fn new(
        route: Route,
        timestamp: NaiveDateTime,
        duration_minutes: f64,
        provenance: Provenance,
    ) -> Self {
        Self {
            route,
            timestamp,
            duration_minutes,
            provenance,
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn weekday(&self) -> Weekday {
        chrono::Datelike::weekday(&self.timestamp)
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_minutes
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_bounds() {
        assert!(Route::new(0).is_none());
        assert!(Route::new(1).is_some());
        assert!(Route::new(19).is_some());
        assert!(Route::new(20).is_none());
        assert_eq!(Route::all().count(), 19);
    }

    #[test]
    fn test_route_classes() {
        let class = |n| Route::new(n).unwrap().class();
        assert_eq!(class(1), RouteClass::CongestionZone);
        assert_eq!(class(13), RouteClass::CongestionZone);
        assert_eq!(class(14), RouteClass::Excluded);
        assert_eq!(class(15), RouteClass::Excluded);
        assert_eq!(class(16), RouteClass::ControlCity);
        assert_eq!(class(18), RouteClass::ControlCity);
        assert_eq!(class(19), RouteClass::Excluded);
    }

    #[test]
    fn test_every_route_has_a_title() {
        for route in Route::all() {
            assert!(!route.title().is_empty());
        }
        assert_eq!(Route::new(14).unwrap().title(), "FDR Drive");
    }

    #[test]
    fn test_route_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<Route>("7").is_ok());
        assert!(serde_json::from_str::<Route>("42").is_err());
    }
}
