//! Batch entry point for the deal engine.
//!
//! Loads the comparable store and raw listings from disk, runs the full
//! pipeline, and writes the ranked opportunities as JSON. Also provides
//! read-only inspection of a persisted logbook snapshot.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use common::{Coordinates, RawListing};
use engine::{ComparableSale, CompStore, DealEngine, EngineConfig, PostcodeCentroids};
use ingest::{validate, MemorySink, RejectionSink};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "deal-cli", about = "Axis deal engine batch runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate listings against the comparable store and write ranked
    /// opportunities.
    Evaluate {
        /// Raw listings file (JSON array).
        #[arg(long)]
        listings: PathBuf,
        /// Comparable sales file (JSON array); overrides configuration.
        #[arg(long)]
        comps: Option<PathBuf>,
        /// Postcode centroid table (JSON map); overrides configuration.
        #[arg(long)]
        centroids: Option<PathBuf>,
        /// Output file; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the version history of a property from a logbook snapshot.
    History {
        /// Logbook snapshot file.
        #[arg(long)]
        snapshot: PathBuf,
        property_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deal_cli=info,engine=info,ingest=info,logbook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Evaluate {
            listings,
            comps,
            centroids,
            out,
        } => evaluate(listings, comps, centroids, out).await,
        Command::History {
            snapshot,
            property_id,
        } => history(snapshot, &property_id),
    }
}

async fn evaluate(
    listings_path: PathBuf,
    comps_override: Option<PathBuf>,
    centroids_override: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<()> {
    // Malformed configuration refuses work up front.
    let config = EngineConfig::load().context("engine configuration is invalid")?;

    let comps_path = comps_override
        .or_else(|| config.comps_path.clone())
        .context("no comparable sales file: pass --comps or set comps_path")?;
    let comps: Vec<ComparableSale> = read_json(&comps_path)?;
    tracing::info!(count = comps.len(), "comparable sales loaded");

    let store = CompStore::new();
    store.insert_batch(comps);

    let centroids = match centroids_override.or_else(|| config.centroids_path.clone()) {
        Some(path) => {
            let table: HashMap<String, Coordinates> = read_json(&path)?;
            PostcodeCentroids::from_map(table)
        }
        None => PostcodeCentroids::new(),
    };

    let raw_listings: Vec<RawListing> = read_json(&listings_path)?;
    let as_of = Utc::now();
    let sink = MemorySink::new();
    let mut assets = Vec::new();
    for raw in &raw_listings {
        match validate(raw, as_of) {
            Ok(asset) => assets.push(asset),
            Err(rejection) => sink.record(rejection),
        }
    }
    tracing::info!(
        validated = assets.len(),
        rejected = sink.len(),
        "listings validated"
    );

    let engine = DealEngine::new(Arc::new(store), Arc::new(centroids), config);
    let ranked = engine.evaluate_batch(assets, as_of).await;

    let body = serde_json::to_string_pretty(&ranked)?;
    match out {
        Some(path) => {
            std::fs::write(&path, body)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), count = ranked.len(), "opportunities written");
        }
        None => println!("{body}"),
    }

    for rejection in sink.drain() {
        eprintln!(
            "rejected {}/{}: {} ({})",
            rejection.source_id,
            rejection.source_listing_id,
            rejection.rejection_code,
            rejection.reason
        );
    }
    Ok(())
}

fn history(snapshot_path: PathBuf, property_id: &str) -> Result<()> {
    let store = logbook::load_snapshot(&snapshot_path)
        .with_context(|| format!("loading {}", snapshot_path.display()))?;
    let headers = store
        .history(property_id)
        .with_context(|| format!("property {property_id}"))?;
    for header in headers {
        println!(
            "v{} {} {} by {} -> {}",
            header.version_number,
            header.timestamp.to_rfc3339(),
            serde_json::to_string(&header.action)?,
            header.action_by,
            header.status_at_version
        );
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}
