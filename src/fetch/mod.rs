//! HTTP plumbing shared by the spreadsheet download and the live store.

mod basic;
pub mod auth;

pub use basic::BasicClient;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, Request, Response, Url};
use tracing::debug;

/// Executes prepared requests. Wrappers such as [`auth::KeyParam`] layer
/// credentials on top of a plain client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// GETs `url` and returns the body. Non-2xx responses are errors.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let parsed: Url = url.parse().with_context(|| format!("Invalid URL {url}"))?;

    let mut req = Request::new(Method::GET, parsed);
    req.headers_mut().insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/csv;q=0.9, */*;q=0.1"),
    );

    let resp = client
        .execute(req)
        .await
        .with_context(|| format!("Request to {url} failed"))?;
    let status = resp.status();
    if !status.is_success() {
        bail!("{url} answered {status}");
    }

    let body = resp.bytes().await?;
    debug!(url, bytes = body.len(), "Fetched");
    Ok(body.to_vec())
}
