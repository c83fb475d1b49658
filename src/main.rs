//! CLI entry point for the Congestion Pricing Tracker.
//!
//! Provides subcommands for each dashboard view, a periodic refresh mode, and
//! publishing every view as JSON to S3 for the static dashboard.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use congestion_tracker::analyzers::aggregate::{DAY_NAMES, parse_weekday};
use congestion_tracker::analyzers::baseline::{CommuteSentence, baseline_difference};
use congestion_tracker::analyzers::series::{daily_comparison, time_of_day_profile, trend_overlay};
use congestion_tracker::config::{LiveStoreConfig, PipelineConfig};
use congestion_tracker::infra::firestore::FirestoreClient;
use congestion_tracker::output::{print_json, write_json, write_json_to_s3, write_series_csv};
use congestion_tracker::pipeline::{Pipeline, Sources};
use congestion_tracker::records::{CommuteRecord, Route};
use congestion_tracker::services::LiveStore;
use serde::Serialize;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "congestion_tracker")]
#[command(about = "Commute times before and after NYC congestion pricing", long_about = None)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Spreadsheet export (CSV path or URL). Falls back to BATCH_SOURCE
    #[arg(long, global = true)]
    batch: Option<String>,

    /// JSON file overriding pipeline defaults
    #[arg(long, global = true)]
    config: Option<String>,

    /// Skip the live document store
    #[arg(long, global = true, default_value_t = false)]
    no_live: bool,

    /// Maximum number of live collections fetched at once
    #[arg(long, global = true, default_value_t = 5)]
    concurrency: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Average commute by time of day for one route and weekday
    Profile {
        #[arg(short, long, default_value_t = 1)]
        route: u8,

        /// Day name, e.g. Monday
        #[arg(short, long, default_value = "Monday")]
        day: String,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Daily averages of each route group
    Daily {
        /// Group names to leave out
        #[arg(long)]
        hide: Vec<String>,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Daily averages with trend lines on each side of the policy start
    Trend {
        /// Group names to leave out
        #[arg(long)]
        hide: Vec<String>,

        #[arg(short, long)]
        output: Option<String>,

        /// Also write the daily points as CSV
        #[arg(long)]
        csv: Option<String>,
    },
    /// Compare one day against the pre-toll average for its weekday
    Compare {
        #[arg(short, long, default_value_t = 1)]
        route: u8,

        /// Date as YYYY-MM-DD
        #[arg(short, long, default_value = "2025-01-06")]
        date: String,
    },
    /// List tracked routes
    Routes,
    /// Compute every view and upload the JSON to S3
    Publish {
        /// S3 bucket name to upload to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: String,

        /// Gzip compress JSON before uploading
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Recompute the trend view periodically. Press Ctrl+C to stop
    Watch {
        /// Seconds between refreshes
        #[arg(short, long, default_value_t = 900)]
        interval: u64,

        #[arg(short, long, default_value = "trend.json")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/congestion_tracker.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("congestion_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    if let Commands::Routes = cli.command {
        for route in Route::all() {
            info!(route = %route, title = route.title(), class = ?route.class(), "Route");
        }
        return Ok(());
    }

    let pipeline = build_pipeline(cli.source)?;
    let config = pipeline.config().clone();

    match cli.command {
        Commands::Profile { route, day, output } => {
            let route = parse_route(route)?;
            let weekday = parse_weekday(&day)
                .with_context(|| format!("Unknown day {day:?}, expected one of {DAY_NAMES:?}"))?;

            let records = pipeline.load_records(&BTreeSet::from([route])).await;
            let profile = time_of_day_profile(
                &records,
                route,
                weekday,
                config.policy_start,
                config.slot_minutes,
            );
            emit(output.as_deref(), &profile)?;
        }
        Commands::Daily { hide, output } => {
            let hidden = hidden_groups(&config, hide);
            let visible: Vec<_> = config
                .groups
                .iter()
                .filter(|g| !hidden.contains(&g.name))
                .cloned()
                .collect();

            let records = pipeline.load_records(&group_routes(&config)).await;
            let comparison = daily_comparison(&records, &visible);
            emit(output.as_deref(), &comparison)?;
        }
        Commands::Trend { hide, output, csv } => {
            let hidden = hidden_groups(&config, hide);
            let records = pipeline.load_records(&group_routes(&config)).await;
            let overlay = trend_overlay(&records, &config.groups, &config.trend_boundaries(), &hidden);
            if let Some(path) = csv {
                write_series_csv(&path, &overlay)?;
            }
            emit(output.as_deref(), &overlay)?;
        }
        Commands::Compare { route, date } => {
            let route = parse_route(route)?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date {date:?}, expected YYYY-MM-DD"))?;

            let records = pipeline.load_records(&BTreeSet::from([route])).await;
            match baseline_difference(&records, route, date, config.policy_start) {
                Some(difference) => {
                    let sentence = CommuteSentence::new(date, route, difference);
                    info!("{sentence}");
                    print_json(&sentence)?;
                }
                None => warn!(route = %route, date = %date, "No data to compare"),
            }
        }
        Commands::Publish { s3_bucket, gzip } => {
            publish(&pipeline, &s3_bucket, gzip).await?;
        }
        Commands::Watch { interval, output } => {
            watch(&pipeline, interval, output).await?;
        }
        Commands::Routes => {}
    }

    Ok(())
}

/// Creates the pipeline with a single live-store handle shared by every run.
fn build_pipeline(args: SourceArgs) -> Result<Pipeline> {
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => PipelineConfig::default(),
    };

    let batch = args.batch.or_else(|| std::env::var("BATCH_SOURCE").ok());
    if batch.is_none() {
        warn!("No batch source given, using live data only");
    }

    let live: Option<Arc<dyn LiveStore>> = if args.no_live {
        None
    } else {
        let live_config = LiveStoreConfig::from_env();
        info!(project = %live_config.project_id, "Live store enabled");
        let store: Arc<dyn LiveStore> = Arc::new(FirestoreClient::new(live_config));
        Some(store)
    };

    Ok(Pipeline::new(
        config,
        Sources {
            batch,
            live,
            concurrency: args.concurrency,
        },
    ))
}

fn parse_route(id: u8) -> Result<Route> {
    match Route::new(id) {
        Some(route) => Ok(route),
        None => bail!("Route must be between {} and {}", Route::MIN, Route::MAX),
    }
}

fn group_routes(config: &PipelineConfig) -> BTreeSet<Route> {
    config
        .groups
        .iter()
        .flat_map(|g| g.routes.iter().copied())
        .collect()
}

/// Collects `--hide` names, warning about names no group has.
fn hidden_groups(config: &PipelineConfig, hide: Vec<String>) -> BTreeSet<String> {
    let hidden: BTreeSet<String> = hide.into_iter().collect();
    for name in &hidden {
        if !config.groups.iter().any(|g| &g.name == name) {
            warn!(group = %name, "Hidden group does not exist");
        }
    }
    hidden
}

fn emit(path: Option<&str>, value: &impl Serialize) -> Result<()> {
    match path {
        Some(path) => write_json(path, value),
        None => print_json(value),
    }
}

/// Summary of a publish run, uploaded as `aggregates/index.json`.
#[derive(Serialize)]
struct PublishIndex {
    generated_at: chrono::DateTime<Utc>,
    records: usize,
    keys: Vec<String>,
}

/// Computes every view for every route and weekday and uploads them.
#[tracing::instrument(skip(pipeline))]
async fn publish(pipeline: &Pipeline, bucket: &str, gzip: bool) -> Result<()> {
    let config = pipeline.config();
    let aws = aws_config::load_from_env().await;
    let s3 = aws_sdk_s3::Client::new(&aws);

    let all_routes: BTreeSet<Route> = Route::all().collect();
    let records = pipeline.load_records(&all_routes).await;
    let mut keys = Vec::new();

    let overlay = trend_overlay(&records, &config.groups, &config.trend_boundaries(), &BTreeSet::new());
    keys.push(write_json_to_s3(&s3, bucket, "aggregates/trend.json", &overlay, gzip).await?);

    for route in Route::all() {
        for day in DAY_NAMES {
            let Some(weekday) = parse_weekday(day) else {
                continue;
            };
            let profile = time_of_day_profile(
                &records,
                route,
                weekday,
                config.policy_start,
                config.slot_minutes,
            );
            let key = format!("aggregates/profiles/route={route}/day={day}.json");
            keys.push(write_json_to_s3(&s3, bucket, &key, &profile, gzip).await?);
        }

        let sentences = sentences_for(&records, route, config);
        let key = format!("aggregates/sentences/route={route}.json");
        keys.push(write_json_to_s3(&s3, bucket, &key, &sentences, gzip).await?);
    }

    let index = PublishIndex {
        generated_at: Utc::now(),
        records: records.len(),
        keys,
    };
    write_json_to_s3(&s3, bucket, "aggregates/index.json", &index, false).await?;

    info!(uploads = index.keys.len() + 1, "Publish complete");
    Ok(())
}

/// Baseline comparisons for every post-policy day that has data on `route`.
fn sentences_for(records: &[CommuteRecord], route: Route, config: &PipelineConfig) -> Vec<CommuteSentence> {
    let days: BTreeSet<NaiveDate> = records
        .iter()
        .filter(|r| r.route() == route && r.timestamp() >= config.policy_start)
        .map(CommuteRecord::date)
        .collect();

    days.into_iter()
        .filter_map(|date| {
            baseline_difference(records, route, date, config.policy_start)
                .map(|difference| CommuteSentence::new(date, route, difference))
        })
        .collect()
}

/// Rewrites the trend view every `interval` seconds until Ctrl+C.
async fn watch(pipeline: &Pipeline, interval: u64, output: String) -> Result<()> {
    let routes = group_routes(pipeline.config());
    info!(interval, output = %output, "Watching. Press Ctrl+C to stop.");

    let refreshed = pipeline
        .watch(
            &routes,
            Duration::from_secs(interval.max(1)),
            |config, records| {
                trend_overlay(records, &config.groups, &config.trend_boundaries(), &BTreeSet::new())
            },
            |overlay| match write_json(&output, &overlay) {
                Ok(()) => info!(output = %output, "View refreshed"),
                Err(e) => error!(error = %e, "Failed to write refreshed view"),
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Cannot listen for Ctrl+C");
                }
            },
        )
        .await;

    info!(refreshed, "Stopping");
    Ok(())
}
