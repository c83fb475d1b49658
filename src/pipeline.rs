//! Loads both sources for a run and hands the merged records to a view.
//!
//! The spreadsheet and the live store are fetched concurrently. A source that
//! fails contributes no records; the run carries on with the other one.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::analyzers::window::scope_sources;
use crate::config::PipelineConfig;
use crate::fetch::{BasicClient, fetch_bytes};
use crate::parser::Normalizer;
use crate::records::{CommuteRecord, Route};
use crate::refresh::RefreshGuard;
use crate::services::live_store::{LiveDocument, LiveStore};

/// Where a run reads its data from.
#[derive(Clone)]
pub struct Sources {
    /// Path or `http(s)` URL of the spreadsheet export.
    pub batch: Option<String>,
    pub live: Option<Arc<dyn LiveStore>>,
    /// Maximum number of route collections fetched at once.
    pub concurrency: usize,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            batch: None,
            live: None,
            concurrency: 5,
        }
    }
}

/// Loads data from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(source), fields(source = %source))]
pub async fn fetch_source(source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, source).await?
    } else {
        tokio::fs::read(source).await?
    };
    Ok(bytes)
}

pub struct Pipeline {
    config: PipelineConfig,
    sources: Sources,
    guard: RefreshGuard,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, sources: Sources) -> Self {
        Self {
            config,
            sources,
            guard: RefreshGuard::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn guard(&self) -> &RefreshGuard {
        &self.guard
    }

    /// Fetches both sources and returns the records each is responsible for.
    #[tracing::instrument(skip(self, routes), fields(routes = routes.len()))]
    pub async fn load_records(&self, routes: &BTreeSet<Route>) -> Vec<CommuteRecord> {
        let normalizer = self.config.normalizer();

        let (batch, live) = tokio::join!(
            self.load_batch(&normalizer),
            self.load_live(routes, &normalizer)
        );
        let (batch_count, live_count) = (batch.len(), live.len());

        let records = scope_sources(batch.into_iter().chain(live), self.config.source_cutover);

        info!(
            batch = batch_count,
            live = live_count,
            kept = records.len(),
            cutover = %self.config.source_cutover,
            "Records loaded"
        );
        records
    }

    /// Runs `view` over freshly loaded records.
    ///
    /// Returns `None` if another refresh started while this one was in
    /// flight, so a late result never replaces a newer one.
    pub async fn refresh<T>(
        &self,
        routes: &BTreeSet<Route>,
        view: impl FnOnce(&PipelineConfig, &[CommuteRecord]) -> T,
    ) -> Option<T> {
        let ticket = self.guard.begin();
        let records = self.load_records(routes).await;

        if !self.guard.is_current(ticket) {
            debug!(generation = ticket.generation(), "Superseded run discarded");
            return None;
        }
        let output = view(&self.config, &records);

        self.guard.is_current(ticket).then_some(output)
    }

    /// Refreshes `view` every `period` and hands each current result to
    /// `publish`, until `stop` resolves. Returns how many results were
    /// published.
    ///
    /// Runs never overlap: a tick that falls due while a run is still loading
    /// is skipped rather than queued.
    pub async fn watch<T>(
        &self,
        routes: &BTreeSet<Route>,
        period: Duration,
        view: impl Fn(&PipelineConfig, &[CommuteRecord]) -> T,
        mut publish: impl FnMut(T),
        stop: impl Future<Output = ()>,
    ) -> usize {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(stop);

        let mut published = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut stop => break,
            }

            let result = tokio::select! {
                result = self.refresh(routes, &view) => result,
                _ = &mut stop => break,
            };
            match result {
                Some(output) => {
                    publish(output);
                    published += 1;
                }
                None => debug!("Refresh superseded by a newer run"),
            }
        }

        self.guard.invalidate();
        published
    }

    async fn load_batch(&self, normalizer: &Normalizer) -> Vec<CommuteRecord> {
        let Some(source) = &self.sources.batch else {
            return Vec::new();
        };

        match fetch_source(source).await {
            Ok(bytes) => normalizer.batch_rows(bytes.as_slice()).collect(),
            Err(e) => {
                warn!(source = %source, error = %e, "Batch source unavailable");
                Vec::new()
            }
        }
    }

    async fn load_live(&self, routes: &BTreeSet<Route>, normalizer: &Normalizer) -> Vec<CommuteRecord> {
        let Some(store) = &self.sources.live else {
            return Vec::new();
        };

        let documents = fetch_collections(store.clone(), routes, self.sources.concurrency).await;

        documents
            .into_iter()
            .flat_map(|(route, docs)| {
                docs.into_iter().filter_map(move |doc| {
                    normalizer
                        .live_entry(route, &doc.key, doc.total_minutes)
                        .inspect_err(|e| {
                            debug!(route = %route, key = %doc.key, error = %e, "Invalid live document skipped")
                        })
                        .ok()
                })
            })
            .collect()
    }
}

/// Fetches the collection of every route, at most `concurrency` at a time.
/// Collections that fail to load are left out.
async fn fetch_collections(
    store: Arc<dyn LiveStore>,
    routes: &BTreeSet<Route>,
    concurrency: usize,
) -> BTreeMap<Route, Vec<LiveDocument>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for &route in routes {
        let store = store.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            (route, store.documents(route).await)
        });
    }

    let mut collections = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((route, Ok(docs))) => {
                debug!(route = %route, documents = docs.len(), "Live collection fetched");
                collections.insert(route, docs);
            }
            Ok((route, Err(e))) => {
                warn!(route = %route, error = %e, "Live collection unavailable");
            }
            Err(e) => {
                warn!(error = %e, "Live fetch task failed");
            }
        }
    }

    collections
}
