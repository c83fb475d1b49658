//! Trait and types for reading the live document store.

use anyhow::Result;

use crate::records::Route;

/// One raw entry of a route's collection.
///
/// `key` encodes the time bucket as `MM_DD_HH-MM`; `total_minutes` is `None`
/// when the entry carries no numeric duration.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveDocument {
    pub key: String,
    pub total_minutes: Option<f64>,
}

impl LiveDocument {
    pub fn new(key: impl Into<String>, total_minutes: Option<f64>) -> Self {
        Self {
            key: key.into(),
            total_minutes,
        }
    }
}

/// Abstraction over the incrementally updated store, one collection per route.
#[async_trait::async_trait]
pub trait LiveStore: Send + Sync {
    /// Returns every document in the collection of `route`.
    async fn documents(&self, route: Route) -> Result<Vec<LiveDocument>>;
}
