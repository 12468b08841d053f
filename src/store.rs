// ==============================================================================
// store.rs - Variant Store (SQLite)
// ==============================================================================
// Description: Primary `variants` table, derived membership tables, load transactions
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Tables:
//   variants                 - one row per (vid, chromosome), list columns as JSON text
//   variant_genes            - (vid, chromosome, gene_symbol)     derived
//   variant_consequences     - (vid, chromosome, consequence)     derived
//   clinvar_classifications  - (vid, chromosome, classification)  derived
//   ingest_runs              - ledger of committed loads
// Derived tables are only ever dropped and rebuilt from `variants` as a whole.
// ==============================================================================

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::audit::IngestRun;
use crate::models::VariantRecord;

/// Columns of the `variants` table, in row-mapping order
pub const VARIANT_COLUMNS: [&str; 22] = [
    "vid",
    "chromosome",
    "variant_index",
    "position",
    "quality",
    "begin_pos",
    "end_pos",
    "ref_allele",
    "alt_allele",
    "genotype",
    "genotype_quality",
    "total_depth",
    "allele_depths",
    "maternal_genotype",
    "paternal_genotype",
    "variant_type",
    "gene_symbols",
    "canonical_transcripts",
    "transcript_consequences",
    "clinvar_classifications",
    "gnomad_af",
    "raw",
];

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS variants (
        vid                     TEXT NOT NULL,
        chromosome              TEXT NOT NULL,
        variant_index           INTEGER NOT NULL,
        position                INTEGER,
        quality                 REAL,
        begin_pos               INTEGER,
        end_pos                 INTEGER,
        ref_allele              TEXT,
        alt_allele              TEXT,
        genotype                TEXT,
        genotype_quality        REAL,
        total_depth             INTEGER,
        allele_depths           TEXT NOT NULL DEFAULT '[]',
        maternal_genotype       TEXT,
        paternal_genotype       TEXT,
        variant_type            TEXT,
        gene_symbols            TEXT NOT NULL DEFAULT '[]',
        canonical_transcripts   TEXT NOT NULL DEFAULT '[]',
        transcript_consequences TEXT NOT NULL DEFAULT '[]',
        clinvar_classifications TEXT NOT NULL DEFAULT '[]',
        gnomad_af               REAL,
        raw                     TEXT NOT NULL,
        PRIMARY KEY (vid, chromosome)
    );

    CREATE INDEX IF NOT EXISTS v_chr_begin_idx ON variants(chromosome, begin_pos);
    CREATE INDEX IF NOT EXISTS v_gnomad_af_idx ON variants(gnomad_af);

    CREATE TABLE IF NOT EXISTS ingest_runs (
        run_id             TEXT PRIMARY KEY,
        source_path        TEXT NOT NULL,
        source_sha256      TEXT,
        started_at         TEXT NOT NULL,
        finished_at        TEXT,
        positions_read     INTEGER NOT NULL,
        variants_seen      INTEGER NOT NULL,
        duplicates_skipped INTEGER NOT NULL,
        records_inserted   INTEGER NOT NULL
    );
";

/// Variant store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Variant ({vid}, {chromosome}) already exists in the store")]
    DuplicateKey { vid: String, chromosome: String },

    #[error("Invalid list column value: {0}")]
    Json(#[from] serde_json::Error),
}

/// Derived one-row-per-value tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTable {
    Genes,
    Consequences,
    Classifications,
}

impl MembershipTable {
    pub const ALL: [MembershipTable; 3] = [
        MembershipTable::Genes,
        MembershipTable::Consequences,
        MembershipTable::Classifications,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            MembershipTable::Genes => "variant_genes",
            MembershipTable::Consequences => "variant_consequences",
            MembershipTable::Classifications => "clinvar_classifications",
        }
    }

    pub fn value_column(&self) -> &'static str {
        match self {
            MembershipTable::Genes => "gene_symbol",
            MembershipTable::Consequences => "consequence",
            MembershipTable::Classifications => "classification",
        }
    }

    /// List column of `variants` this table is derived from
    pub fn source_column(&self) -> &'static str {
        match self {
            MembershipTable::Genes => "gene_symbols",
            MembershipTable::Consequences => "transcript_consequences",
            MembershipTable::Classifications => "clinvar_classifications",
        }
    }

    fn index_prefix(&self) -> &'static str {
        match self {
            MembershipTable::Genes => "vg",
            MembershipTable::Consequences => "vtc",
            MembershipTable::Classifications => "vcc",
        }
    }

    /// Table and index DDL; `if_not_exists` for schema creation, plain for rebuilds
    fn ddl(&self, if_not_exists: bool) -> String {
        let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
        let table = self.table_name();
        let column = self.value_column();
        let prefix = self.index_prefix();

        format!(
            "CREATE TABLE {guard}{table} (
                 vid        TEXT NOT NULL,
                 chromosome TEXT NOT NULL,
                 {column}   TEXT NOT NULL
             );
             CREATE INDEX {guard}{prefix}_value_idx ON {table}({column});
             CREATE INDEX {guard}{prefix}_vid_chr_idx ON {table}(vid, chromosome);"
        )
    }

    fn populate_sql(&self) -> String {
        format!(
            "INSERT INTO {table} (vid, chromosome, {column})
             SELECT v.vid, v.chromosome, j.value
             FROM variants AS v, json_each(v.{source}) AS j
             WHERE v.{source} IS NOT NULL",
            table = self.table_name(),
            column = self.value_column(),
            source = self.source_column(),
        )
    }
}

/// Row counts of the membership tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipCounts {
    pub genes: u64,
    pub consequences: u64,
    pub classifications: u64,
}

impl MembershipCounts {
    fn set(&mut self, table: MembershipTable, count: u64) {
        match table {
            MembershipTable::Genes => self.genes = count,
            MembershipTable::Consequences => self.consequences = count,
            MembershipTable::Classifications => self.classifications = count,
        }
    }
}

/// Comma-separated `variants` column list, optionally qualified with a table alias
pub fn variant_column_list(alias: Option<&str>) -> String {
    VARIANT_COLUMNS
        .iter()
        .map(|column| match alias {
            Some(alias) => format!("{alias}.{column}"),
            None => (*column).to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn json_list<T: serde::de::DeserializeOwned>(row: &Row, index: usize) -> rusqlite::Result<Vec<T>> {
    let text: Option<String> = row.get(index)?;
    match text {
        None => Ok(Vec::new()),
        Some(text) => serde_json::from_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
        }),
    }
}

/// Map a row selected with `variant_column_list` back to a record
pub fn record_from_row(row: &Row) -> rusqlite::Result<VariantRecord> {
    Ok(VariantRecord {
        vid: row.get(0)?,
        chromosome: row.get(1)?,
        variant_index: row.get(2)?,
        position: row.get(3)?,
        quality: row.get(4)?,
        begin_pos: row.get(5)?,
        end_pos: row.get(6)?,
        ref_allele: row.get(7)?,
        alt_allele: row.get(8)?,
        genotype: row.get(9)?,
        genotype_quality: row.get(10)?,
        total_depth: row.get(11)?,
        allele_depths: json_list(row, 12)?,
        maternal_genotype: row.get(13)?,
        paternal_genotype: row.get(14)?,
        variant_type: row.get(15)?,
        gene_symbols: json_list(row, 16)?,
        canonical_transcripts: json_list(row, 17)?,
        transcript_consequences: json_list(row, 18)?,
        clinvar_classifications: json_list(row, 19)?,
        gnomad_af: row.get::<_, Option<f64>>(20)?.unwrap_or(0.0),
        raw: row.get(21)?,
    })
}

/// Handle on a variant store database
pub struct VariantStore {
    conn: Connection,
}

impl VariantStore {
    /// Open (or create) a writable store and ensure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening variant store: {:?}", path);

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL: readers see the store either before or after a load commit
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Journal mode: {}", mode);
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;

        let store = Self { conn };
        store.create_schema()?;
        Ok(store)
    }

    /// Open an existing store for queries only
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self { conn })
    }

    /// Scratch store, mainly for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.create_schema()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create the primary table, its indexes, the ledger and empty membership tables
    fn create_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        for table in MembershipTable::ALL {
            self.conn.execute_batch(&table.ddl(true))?;
        }
        Ok(())
    }

    /// Start the single write transaction of a load run
    ///
    /// Nothing written through the returned handle is visible to other
    /// connections until `commit`; dropping it without committing rolls back
    /// every batch.
    pub fn begin_load(&mut self) -> Result<LoadTransaction<'_>, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(LoadTransaction { tx, inserted: 0 })
    }

    /// Drop and recreate all membership tables from `variants`
    ///
    /// Runs in its own transaction, separate from any load.
    pub fn rebuild_membership_tables(&mut self) -> Result<MembershipCounts, StoreError> {
        info!("Rebuilding membership tables");
        let tx = self.conn.transaction()?;
        let mut counts = MembershipCounts::default();

        for table in MembershipTable::ALL {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", table.table_name()))?;
            tx.execute_batch(&table.ddl(false))?;
            let rows = tx.execute(&table.populate_sql(), [])?;
            debug!("  {}: {} rows", table.table_name(), rows);
            counts.set(table, rows as u64);
        }

        tx.commit()?;
        info!(
            "Membership tables rebuilt: {} gene, {} consequence, {} classification rows",
            counts.genes, counts.consequences, counts.classifications
        );
        Ok(counts)
    }

    pub fn variant_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM variants", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn membership_count(&self, table: MembershipTable) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.table_name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn membership_counts(&self) -> Result<MembershipCounts, StoreError> {
        let mut counts = MembershipCounts::default();
        for table in MembershipTable::ALL {
            counts.set(table, self.membership_count(table)?);
        }
        Ok(counts)
    }

    /// Look up one record by its key
    pub fn get_variant(
        &self,
        vid: &str,
        chromosome: &str,
    ) -> Result<Option<VariantRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM variants WHERE vid = ?1 AND chromosome = ?2",
            variant_column_list(None)
        );
        let record = self
            .conn
            .query_row(&sql, params![vid, chromosome], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// Ledger of committed loads
    pub fn ingest_runs(&self) -> Result<Vec<IngestRun>, StoreError> {
        Ok(IngestRun::list(&self.conn)?)
    }
}

/// Write transaction spanning every batch of one load run
pub struct LoadTransaction<'conn> {
    tx: Transaction<'conn>,
    inserted: u64,
}

impl LoadTransaction<'_> {
    /// Bulk-insert one batch
    ///
    /// A `(vid, chromosome)` already present is a `DuplicateKey` error; the
    /// caller is expected to roll the whole load back.
    pub fn insert_batch(&mut self, records: &[VariantRecord]) -> Result<usize, StoreError> {
        let sql = format!(
            "INSERT INTO variants ({}) VALUES ({})",
            variant_column_list(None),
            (1..=VARIANT_COLUMNS.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = self.tx.prepare_cached(&sql)?;

        for record in records {
            let result = stmt.execute(params![
                record.vid,
                record.chromosome,
                record.variant_index,
                record.position,
                record.quality,
                record.begin_pos,
                record.end_pos,
                record.ref_allele,
                record.alt_allele,
                record.genotype,
                record.genotype_quality,
                record.total_depth,
                serde_json::to_string(&record.allele_depths)?,
                record.maternal_genotype,
                record.paternal_genotype,
                record.variant_type,
                serde_json::to_string(&record.gene_symbols)?,
                serde_json::to_string(&record.canonical_transcripts)?,
                serde_json::to_string(&record.transcript_consequences)?,
                serde_json::to_string(&record.clinvar_classifications)?,
                record.gnomad_af,
                record.raw,
            ]);

            match result {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                {
                    return Err(StoreError::DuplicateKey {
                        vid: record.vid.clone(),
                        chromosome: record.chromosome.clone(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.inserted += records.len() as u64;
        Ok(records.len())
    }

    /// Records inserted through this transaction so far
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    /// Record the run in the ledger as part of this transaction
    pub fn log_run(&self, run: &IngestRun) -> Result<(), StoreError> {
        run.log(&self.tx)?;
        Ok(())
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_record;
    use tempfile::tempdir;

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("variants.db");

        VariantStore::open(&path).unwrap();
        let store = VariantStore::open(&path).unwrap();
        assert_eq!(store.variant_count().unwrap(), 0);
        assert_eq!(store.membership_counts().unwrap(), MembershipCounts::default());
    }

    #[test]
    fn test_insert_and_fetch_round_trip() {
        let mut store = VariantStore::open_in_memory().unwrap();
        let record = sample_record("1-100-A-G", "chr1", 100, &["BRCA1"], &["Pathogenic"], 0.0001);

        let mut load = store.begin_load().unwrap();
        assert_eq!(load.insert_batch(std::slice::from_ref(&record)).unwrap(), 1);
        assert_eq!(load.inserted(), 1);
        load.commit().unwrap();

        let fetched = store.get_variant("1-100-A-G", "chr1").unwrap().unwrap();
        assert_eq!(fetched, record);
        assert!(store.get_variant("1-100-A-G", "chr2").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_key_is_reported() {
        let mut store = VariantStore::open_in_memory().unwrap();
        let record = sample_record("1-100-A-G", "chr1", 100, &[], &[], 0.0);

        let mut load = store.begin_load().unwrap();
        load.insert_batch(std::slice::from_ref(&record)).unwrap();
        load.commit().unwrap();

        let mut load = store.begin_load().unwrap();
        match load.insert_batch(std::slice::from_ref(&record)) {
            Err(StoreError::DuplicateKey { vid, chromosome }) => {
                assert_eq!(vid, "1-100-A-G");
                assert_eq!(chromosome, "chr1");
            }
            other => panic!("Expected DuplicateKey, got {:?}", other),
        }
        load.rollback().unwrap();
        assert_eq!(store.variant_count().unwrap(), 1);
    }

    #[test]
    fn test_same_vid_on_other_chromosome_is_allowed() {
        let mut store = VariantStore::open_in_memory().unwrap();
        let mut load = store.begin_load().unwrap();
        load.insert_batch(&[
            sample_record("x", "chr1", 1, &[], &[], 0.0),
            sample_record("x", "chr2", 1, &[], &[], 0.0),
        ])
        .unwrap();
        load.commit().unwrap();
        assert_eq!(store.variant_count().unwrap(), 2);
    }

    #[test]
    fn test_dropped_load_rolls_back() {
        let mut store = VariantStore::open_in_memory().unwrap();
        {
            let mut load = store.begin_load().unwrap();
            load.insert_batch(&[sample_record("a", "chr1", 1, &[], &[], 0.0)])
                .unwrap();
        }
        assert_eq!(store.variant_count().unwrap(), 0);
    }

    #[test]
    fn test_membership_rows_match_set_cardinality() {
        let mut store = VariantStore::open_in_memory().unwrap();
        let mut with_consequences = sample_record("c", "chr3", 30, &[], &[], 0.2);
        with_consequences.transcript_consequences =
            vec!["missense_variant".into(), "splice_region_variant".into()];

        let records = vec![
            sample_record("a", "chr1", 10, &["BRCA1", "NBR2"], &["Pathogenic"], 0.0),
            sample_record("b", "chr2", 20, &[], &["Benign", "Likely benign"], 0.1),
            with_consequences,
        ];

        let mut load = store.begin_load().unwrap();
        load.insert_batch(&records).unwrap();
        load.commit().unwrap();

        let counts = store.rebuild_membership_tables().unwrap();
        let expected_genes: usize = records.iter().map(|r| r.gene_symbols.len()).sum();
        let expected_consequences: usize =
            records.iter().map(|r| r.transcript_consequences.len()).sum();
        let expected_classifications: usize =
            records.iter().map(|r| r.clinvar_classifications.len()).sum();

        assert_eq!(counts.genes, expected_genes as u64);
        assert_eq!(counts.consequences, expected_consequences as u64);
        assert_eq!(counts.classifications, expected_classifications as u64);
        assert_eq!(store.membership_counts().unwrap(), counts);

        // A second rebuild replaces rather than appends
        let again = store.rebuild_membership_tables().unwrap();
        assert_eq!(again, counts);
        assert_eq!(store.membership_count(MembershipTable::Genes).unwrap(), 2);
    }

    #[test]
    fn test_read_only_store_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("variants.db");
        drop(VariantStore::open(&path).unwrap());

        let store = VariantStore::open_read_only(&path).unwrap();
        assert_eq!(store.variant_count().unwrap(), 0);
        assert!(store
            .connection()
            .execute("DELETE FROM variants", [])
            .is_err());
    }
}
