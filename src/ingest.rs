// ==============================================================================
// ingest.rs - Ingestion Pipeline
// ==============================================================================
// Description: Streams positions into the store: dedup, normalize, batch, commit
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Atomicity: every batch of a run is written inside ONE transaction. Any error
// (decode, dedup, constraint) rolls back all batches of the run, including the
// ones already flushed, and is returned to the caller. Membership tables are
// rebuilt only after the commit, in a separate step.
// ==============================================================================

use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::IngestRun;
use crate::config::{ConfigError, IngestConfig};
use crate::dedup::{DedupError, Deduplicator, InMemoryDeduplicator};
use crate::models::{Position, VariantRecord};
use crate::normalizer::build_variant_record;
use crate::parsers::{open_positions, DecodeError};
use crate::store::{LoadTransaction, MembershipCounts, StoreError, VariantStore};
use crate::validator::{validate_input, ValidationError};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid ingestion settings: {0}")]
    Config(#[from] ConfigError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to decode input: {0}")]
    Decode(#[from] DecodeError),

    #[error("Deduplication failed: {0}")]
    Dedup(#[from] DedupError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Primary data is committed; only the derived tables are stale
    #[error("Membership table rebuild failed after commit: {0}")]
    Rebuild(#[source] StoreError),
}

/// Outcome of a committed run
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub run_id: Uuid,
    pub positions_read: u64,
    pub variants_seen: u64,
    pub duplicates_skipped: u64,
    pub records_inserted: u64,
    pub membership: MembershipCounts,
}

/// Single-pass loader of decoded positions
pub struct IngestPipeline<D = InMemoryDeduplicator> {
    config: IngestConfig,
    dedup: D,
}

impl IngestPipeline<InMemoryDeduplicator> {
    pub fn new(config: IngestConfig) -> Result<Self, IngestError> {
        let mut dedup = InMemoryDeduplicator::new();
        if let Some(limit) = config.dedup_capacity {
            dedup = dedup.with_capacity_limit(limit);
        }
        Self::with_deduplicator(config, dedup)
    }
}

impl<D: Deduplicator> IngestPipeline<D> {
    pub fn with_deduplicator(config: IngestConfig, dedup: D) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self { config, dedup })
    }

    /// Load every position into `store`, all or nothing
    ///
    /// On error the store is left exactly as it was before the call.
    pub fn run<I>(
        &mut self,
        store: &mut VariantStore,
        positions: I,
        mut run: IngestRun,
    ) -> Result<IngestSummary, IngestError>
    where
        I: IntoIterator<Item = Result<Position, DecodeError>>,
    {
        info!("Starting ingestion run {} from {}", run.run_id, run.source_path);
        info!("Batch size: {}", self.config.batch_size);

        self.dedup.reset();

        let mut load = store.begin_load()?;
        if let Err(e) = self.load(&mut load, positions, &mut run) {
            error!("Ingestion run {} failed, rolling back: {}", run.run_id, e);
            if let Err(rollback_error) = load.rollback() {
                warn!("Rollback reported an error: {}", rollback_error);
            }
            return Err(e);
        }
        load.commit()?;

        info!(
            "Committed {} records ({} positions, {} duplicates skipped)",
            run.records_inserted, run.positions_read, run.duplicates_skipped
        );

        let membership = store
            .rebuild_membership_tables()
            .map_err(IngestError::Rebuild)?;

        Ok(IngestSummary {
            run_id: run.run_id,
            positions_read: run.positions_read,
            variants_seen: run.variants_seen,
            duplicates_skipped: run.duplicates_skipped,
            records_inserted: run.records_inserted,
            membership,
        })
    }

    fn load<I>(
        &mut self,
        load: &mut LoadTransaction<'_>,
        positions: I,
        run: &mut IngestRun,
    ) -> Result<(), IngestError>
    where
        I: IntoIterator<Item = Result<Position, DecodeError>>,
    {
        let batch_size = self.config.batch_size;
        let mut batch: Vec<VariantRecord> = Vec::with_capacity(batch_size);

        for position in positions {
            let position = position?;
            run.positions_read += 1;

            for (index, source) in position.variants.iter().enumerate() {
                run.variants_seen += 1;

                if !self.dedup.first_occurrence(&source.variant.vid)? {
                    debug!("Skipping duplicate variant {}", source.variant.vid);
                    run.duplicates_skipped += 1;
                    continue;
                }

                batch.push(build_variant_record(source, index, &position));
                if batch.len() >= batch_size {
                    flush(load, &mut batch)?;
                }
            }
        }

        if !batch.is_empty() {
            flush(load, &mut batch)?;
        }

        run.records_inserted = load.inserted();
        run.finish();
        load.log_run(run)?;
        Ok(())
    }
}

fn flush(load: &mut LoadTransaction<'_>, batch: &mut Vec<VariantRecord>) -> Result<(), IngestError> {
    load.insert_batch(batch)?;
    batch.clear();
    info!("Inserted {} records...", load.inserted());
    Ok(())
}

/// Validate, decode and load one annotation file into the store at `db_path`
pub fn ingest_file(
    json_path: impl AsRef<Path>,
    db_path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<IngestSummary, IngestError> {
    let mut pipeline = IngestPipeline::new(config.clone())?;

    let input = validate_input(json_path)?;
    info!(
        "Input {:?}: {} bytes, sha256 {}",
        input.path, input.size, input.hash_sha256
    );
    let positions = open_positions(&input.path)?;

    let mut store = VariantStore::open(db_path)?;
    let run = IngestRun::start(input.path.display().to_string(), Some(input.hash_sha256));

    pipeline.run(&mut store, positions, run)
}
