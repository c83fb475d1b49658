//! Output formatting and persistence for computed views.
//!
//! Supports JSON on stdout or in files, CSV export of daily series, and
//! upload to S3 for a static dashboard.

use anyhow::Result;
use aws_sdk_s3::primitives::ByteStream;
use chrono::NaiveDate;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info};

use crate::analyzers::series::TrendOverlay;
use crate::analyzers::types::DailyPoint;
use csv::WriterBuilder;
use std::fs::File;

/// Writes a value to stdout as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes a value as pretty-printed JSON, replacing any existing file.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    info!(path, "JSON written");
    Ok(())
}

/// One CSV row per day per series.
#[derive(Debug, Serialize)]
struct DailyRow<'a> {
    series: &'a str,
    date: NaiveDate,
    x: i64,
    average: Option<f64>,
}

/// Writes every daily point of `overlay` as a CSV row with a header.
pub fn write_series_csv(path: &str, overlay: &TrendOverlay) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for series in &overlay.series {
        for DailyPoint { date, x, average } in &series.points {
            writer.serialize(DailyRow {
                series: &series.name,
                date: *date,
                x: *x,
                average: *average,
            })?;
        }
    }
    writer.flush()?;

    debug!(path, series = overlay.series.len(), "CSV written");
    Ok(())
}

/// Serializes `value` to JSON, optionally gzip-compresses it, and uploads it
/// with `application/json` content type. Returns the object key used.
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
    gzip: bool,
) -> Result<String> {
    let body = serde_json::to_vec(value)?;

    let (body, key) = if gzip {
        (gzip_bytes(&body)?, format!("{key}.gz"))
    } else {
        (body, key.to_string())
    };

    let mut request = client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(body))
        .content_type("application/json");
    if gzip {
        request = request.content_encoding("gzip");
    }
    request.send().await?;

    debug!(bucket, key = %key, "Uploaded to S3");
    Ok(key)
}

fn gzip_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}
