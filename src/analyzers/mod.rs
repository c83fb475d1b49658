//! Commute aggregation pipeline.
//!
//! Records from both sources are bucketed by time-of-day slot or calendar
//! day, averaged, split at policy boundaries, and summarized with trend lines
//! or a baseline comparison.

pub mod aggregate;
pub mod baseline;
pub mod series;
pub mod trend;
pub mod types;
pub mod utility;
pub mod window;
