//! Pipeline and data-source configuration.
//!
//! Defaults describe the collected New York data set. A JSON file can
//! override any of them:
//! ```json
//! {
//!   "source_cutover": "2024-12-29T05:00:00",
//!   "policy_start": "2025-01-05T00:00:00",
//!   "years": { "default_year": 2025, "months": { "12": 2024 } }
//! }
//! ```

use anyhow::{Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::analyzers::aggregate::DEFAULT_SLOT_MINUTES;
use crate::analyzers::types::RouteGroup;
use crate::analyzers::window::Boundary;
use crate::parser::{DEFAULT_MAX_DURATION_MINUTES, Normalizer, YearTable};

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Batch records cover time before this instant, live records from it on.
    pub source_cutover: NaiveDateTime,
    /// Start of congestion pricing.
    pub policy_start: NaiveDateTime,
    /// Where daily trend lines are split. Empty means a single split at
    /// `policy_start`; see [`PipelineConfig::trend_boundaries`].
    pub trend_splits: Vec<Boundary>,
    pub slot_minutes: u32,
    pub max_duration_minutes: f64,
    pub years: YearTable,
    pub groups: Vec<RouteGroup>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_cutover: at(2024, 12, 29, 5, 0),
            policy_start: at(2025, 1, 5, 0, 0),
            trend_splits: Vec::new(),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            max_duration_minutes: DEFAULT_MAX_DURATION_MINUTES,
            years: YearTable::default(),
            groups: vec![RouteGroup::congestion_zone(), RouteGroup::control_cities()],
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`, filling unset fields with
    /// defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slot_minutes == 0 || (24 * 60) % self.slot_minutes != 0 {
            bail!("slot_minutes must evenly divide a day, got {}", self.slot_minutes);
        }
        if self.max_duration_minutes.is_nan() || self.max_duration_minutes <= 0.0 {
            bail!("max_duration_minutes must be positive");
        }
        Ok(())
    }

    /// Boundaries the trend lines are split at. Follows `policy_start`
    /// unless `trend_splits` names its own.
    pub fn trend_boundaries(&self) -> Vec<Boundary> {
        if self.trend_splits.is_empty() {
            vec![Boundary::new("policy start", self.policy_start)]
        } else {
            self.trend_splits.clone()
        }
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.years.clone(), self.max_duration_minutes)
    }
}

/// Connection settings for the Firestore-style live store.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveStoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub api_key: Option<String>,
    pub page_size: u32,
}

impl Default for LiveStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://firestore.googleapis.com".to_string(),
            project_id: "new-york-routes".to_string(),
            api_key: None,
            page_size: 300,
        }
    }
}

impl LiveStoreConfig {
    /// Reads `FIRESTORE_BASE_URL`, `FIRESTORE_PROJECT_ID`, `FIRESTORE_API_KEY`
    /// and `FIRESTORE_PAGE_SIZE`, keeping defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("FIRESTORE_BASE_URL").unwrap_or(defaults.base_url),
            project_id: std::env::var("FIRESTORE_PROJECT_ID").unwrap_or(defaults.project_id),
            api_key: std::env::var("FIRESTORE_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            page_size: std::env::var("FIRESTORE_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.source_cutover.to_string(), "2024-12-29 05:00:00");
        assert_eq!(config.trend_boundaries(), vec![Boundary::new("policy start", config.policy_start)]);
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.groups[0].routes.len(), 13);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"policy_start": "2025-01-06T00:00:00", "years": {{"default_year": 2026, "months": {{"12": 2025}}}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.policy_start.to_string(), "2025-01-06 00:00:00");
        assert_eq!(config.years.year_for(12), 2025);
        assert_eq!(config.years.year_for(1), 2026);
        assert_eq!(config.slot_minutes, 15);
    }

    #[test]
    fn test_trend_split_follows_overridden_policy_start() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"policy_start": "2025-01-20T00:00:00"}}"#).unwrap();

        let config = PipelineConfig::load(file.path().to_str().unwrap()).unwrap();
        let boundaries = config.trend_boundaries();

        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].at, config.policy_start);
        assert_eq!(boundaries[0].at.to_string(), "2025-01-20 00:00:00");
    }

    #[test]
    fn test_explicit_trend_splits_are_kept() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"trend_splits": [{{"name": "holidays", "at": "2024-12-25T00:00:00"}}, {{"name": "toll", "at": "2025-01-05T00:00:00"}}]}}"#
        )
        .unwrap();

        let config = PipelineConfig::load(file.path().to_str().unwrap()).unwrap();
        let names: Vec<_> = config.trend_boundaries().into_iter().map(|b| b.name).collect();

        assert_eq!(names, ["holidays", "toll"]);
    }

    #[test]
    fn test_rejects_uneven_slots() {
        let config = PipelineConfig {
            slot_minutes: 7,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
