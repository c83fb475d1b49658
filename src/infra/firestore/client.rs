use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::LiveStoreConfig;
use crate::fetch::auth::KeyParam;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::records::Route;
use crate::services::live_store::{LiveDocument, LiveStore};

/// Field holding the measured duration in every document.
const DURATION_FIELD: &str = "total_minutes";

#[derive(Deserialize)]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, serde_json::Value>,
}

/// Read-only client for the Firestore REST API.
///
/// Built once at startup and shared by every run.
pub struct FirestoreClient {
    http: Box<dyn HttpClient>,
    base_url: String,
    project_id: String,
    page_size: u32,
}

impl FirestoreClient {
    pub fn new(config: LiveStoreConfig) -> Self {
        let http: Box<dyn HttpClient> = match config.api_key {
            Some(key) => Box::new(KeyParam::new(BasicClient::new(), key)),
            None => Box::new(BasicClient::new()),
        };
        Self::with_http(http, config.base_url, config.project_id, config.page_size)
    }

    pub fn with_http(
        http: Box<dyn HttpClient>,
        base_url: String,
        project_id: String,
        page_size: u32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id,
            page_size,
        }
    }

    fn collection_url(&self, route: Route, page_token: Option<&str>) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            route
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &self.page_size.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl LiveStore for FirestoreClient {
    #[tracing::instrument(skip(self, route), fields(route = %route))]
    async fn documents(&self, route: Route) -> Result<Vec<LiveDocument>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.collection_url(route, page_token.as_deref())?;
            let bytes = fetch_bytes(self.http.as_ref(), url.as_str())
                .await
                .with_context(|| format!("Failed to list collection {route}"))?;
            let (page, next) = parse_documents_page(&bytes)?;

            debug!(page_documents = page.len(), "Live store page received");
            documents.extend(page);

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }
}

/// Decodes one `ListDocuments` response page into documents and the next
/// page token.
pub fn parse_documents_page(bytes: &[u8]) -> Result<(Vec<LiveDocument>, Option<String>)> {
    let response: ListDocumentsResponse =
        serde_json::from_slice(bytes).context("Failed to parse live store response")?;

    let documents = response
        .documents
        .into_iter()
        .map(|doc| {
            let key = doc.name.rsplit('/').next().unwrap_or_default().to_string();
            let total_minutes = doc.fields.get(DURATION_FIELD).and_then(numeric_value);
            LiveDocument { key, total_minutes }
        })
        .collect();

    Ok((documents, response.next_page_token))
}

/// Reads a Firestore typed value (`integerValue` is string-encoded).
fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    if let Some(double) = value.get("doubleValue") {
        return double.as_f64();
    }
    match value.get("integerValue")? {
        serde_json::Value::String(s) => s.parse().ok(),
        other => other.as_f64(),
    }
}
