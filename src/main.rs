// ==============================================================================
// main.rs - Variant Store Entry Point
// ==============================================================================
// Description: Command-line loader and query tool for the variant store
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use variant_store::config::DEFAULT_BATCH_SIZE;
use variant_store::query::DEFAULT_LIMIT;
use variant_store::{ingest_file, IngestConfig, QueryEngine, VariantQuery, VariantReport, VariantStore};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a gzipped Nirvana JSON file into the store
    Ingest {
        /// Annotation file (.json.gz)
        #[arg(long)]
        json: PathBuf,

        /// Store database file (created if missing)
        #[arg(long, env = "VARIANT_STORE_DB")]
        db: PathBuf,

        /// Records per bulk insert
        #[arg(long, env = "VARIANT_STORE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Fail once more distinct variant IDs than this have been seen
        #[arg(long, env = "VARIANT_STORE_DEDUP_CAPACITY")]
        dedup_capacity: Option<usize>,
    },

    /// Filtered, paginated variant query
    Query {
        /// Store database file
        #[arg(long, env = "VARIANT_STORE_DB")]
        db: PathBuf,

        /// Gene symbol (exact match)
        #[arg(long)]
        gene: Option<String>,

        /// Accepted ClinVar classifications, comma-separated
        #[arg(long, value_delimiter = ',')]
        clinvar: Vec<String>,

        /// Accepted consequence terms, comma-separated
        #[arg(long, value_delimiter = ',')]
        consequence: Vec<String>,

        /// Maximum gnomAD allele frequency (inclusive)
        #[arg(long)]
        max_gnomad_freq: Option<f64>,

        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: u64,

        #[arg(long, default_value_t = 0)]
        offset: u64,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Record counts and ingestion history
    Stats {
        /// Store database file
        #[arg(long, env = "VARIANT_STORE_DB")]
        db: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "variant_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Ingest {
            json,
            db,
            batch_size,
            dedup_capacity,
        } => {
            let config = IngestConfig::new()
                .with_batch_size(batch_size)
                .with_dedup_capacity(dedup_capacity);
            config.validate().context("Invalid ingestion settings")?;

            info!("Ingesting {:?} into {:?}", json, db);
            let summary = tokio::task::spawn_blocking(move || ingest_file(&json, &db, &config))
                .await
                .context("Ingestion task panicked")?
                .context("Ingestion failed; store left unchanged")?;

            println!("Total records inserted: {}", summary.records_inserted);
            println!(
                "Positions: {}, variants seen: {}, duplicates skipped: {}",
                summary.positions_read, summary.variants_seen, summary.duplicates_skipped
            );
            println!("Run ID: {}", summary.run_id);
        }

        Command::Query {
            db,
            gene,
            clinvar,
            consequence,
            max_gnomad_freq,
            limit,
            offset,
            format,
        } => {
            let mut query = VariantQuery::new().with_limit(limit).with_offset(offset);
            if let Some(gene) = gene {
                query = query.with_gene(gene);
            }
            if !clinvar.is_empty() {
                query = query.with_clinvar(clinvar);
            }
            if !consequence.is_empty() {
                query = query.with_consequences(consequence);
            }
            if let Some(max) = max_gnomad_freq {
                query = query.with_max_gnomad_freq(max);
            }

            let page = QueryEngine::new(db)
                .query_async(query)
                .await
                .context("Query failed")?;
            let report = VariantReport::from_page(&page)
                .context("Stored variant payload could not be parsed")?;

            match format {
                OutputFormat::Text => print!("{}", report),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }

        Command::Stats { db } => {
            let stats = tokio::task::spawn_blocking(move || -> Result<()> {
                let store = VariantStore::open_read_only(&db)
                    .with_context(|| format!("Failed to open store {:?}", db))?;
                let counts = store.membership_counts()?;

                println!("Variants: {}", store.variant_count()?);
                println!("Gene memberships: {}", counts.genes);
                println!("Consequence memberships: {}", counts.consequences);
                println!("ClinVar memberships: {}", counts.classifications);

                let runs = store.ingest_runs()?;
                if runs.is_empty() {
                    warn!("No ingestion runs recorded in {:?}", db);
                }
                for run in runs {
                    println!(
                        "Run {} [{}]: {} inserted, {} duplicates skipped from {}",
                        run.run_id,
                        run.started_at.to_rfc3339(),
                        run.records_inserted,
                        run.duplicates_skipped,
                        run.source_path
                    );
                }
                Ok(())
            });
            stats.await.context("Stats task panicked")??;
        }
    }

    Ok(())
}
