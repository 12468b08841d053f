// ==============================================================================
// audit.rs - Ingestion Run Ledger
// ==============================================================================
// Description: One row per committed load: source file, digest, counters, timing
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// The row is written inside the load transaction, so a rolled-back run leaves
// no trace in `ingest_runs`.
// ==============================================================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger entry for one ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRun {
    pub run_id: Uuid,
    pub source_path: String,
    pub source_sha256: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub positions_read: u64,
    pub variants_seen: u64,
    pub duplicates_skipped: u64,
    pub records_inserted: u64,
}

impl IngestRun {
    pub fn start(source_path: impl Into<String>, source_sha256: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source_path: source_path.into(),
            source_sha256,
            started_at: Utc::now(),
            finished_at: None,
            positions_read: 0,
            variants_seen: 0,
            duplicates_skipped: 0,
            records_inserted: 0,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Insert this run into `ingest_runs`
    pub fn log(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO ingest_runs
             (run_id, source_path, source_sha256, started_at, finished_at,
              positions_read, variants_seen, duplicates_skipped, records_inserted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.run_id.to_string(),
                self.source_path,
                self.source_sha256,
                self.started_at.to_rfc3339(),
                self.finished_at.map(|t| t.to_rfc3339()),
                self.positions_read as i64,
                self.variants_seen as i64,
                self.duplicates_skipped as i64,
                self.records_inserted as i64,
            ],
        )?;
        Ok(())
    }

    /// All recorded runs, oldest first
    pub fn list(conn: &Connection) -> rusqlite::Result<Vec<IngestRun>> {
        let mut stmt = conn.prepare(
            "SELECT run_id, source_path, source_sha256, started_at, finished_at,
                    positions_read, variants_seen, duplicates_skipped, records_inserted
             FROM ingest_runs
             ORDER BY started_at, run_id",
        )?;

        let runs = stmt.query_map([], |row| {
            let run_id: String = row.get(0)?;
            let started_at: String = row.get(3)?;
            let finished_at: Option<String> = row.get(4)?;

            Ok(IngestRun {
                run_id: Uuid::parse_str(&run_id).map_err(|e| conversion_error(0, e))?,
                source_path: row.get(1)?,
                source_sha256: row.get(2)?,
                started_at: parse_timestamp(&started_at).map_err(|e| conversion_error(3, e))?,
                finished_at: finished_at
                    .as_deref()
                    .map(parse_timestamp)
                    .transpose()
                    .map_err(|e| conversion_error(4, e))?,
                positions_read: row.get::<_, i64>(5)? as u64,
                variants_seen: row.get::<_, i64>(6)? as u64,
                duplicates_skipped: row.get::<_, i64>(7)? as u64,
                records_inserted: row.get::<_, i64>(8)? as u64,
            })
        })?;

        runs.collect()
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|t| t.with_timezone(&Utc))
}

fn conversion_error<E>(column: usize, error: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VariantStore;

    #[test]
    fn test_log_and_list() {
        let store = VariantStore::open_in_memory().unwrap();

        let mut run = IngestRun::start("/data/sample.json.gz", Some("ab12".to_string()));
        run.positions_read = 10;
        run.variants_seen = 12;
        run.duplicates_skipped = 2;
        run.records_inserted = 10;
        run.finish();
        run.log(store.connection()).unwrap();

        let runs = IngestRun::list(store.connection()).unwrap();
        assert_eq!(runs.len(), 1);

        let stored = &runs[0];
        assert_eq!(stored.run_id, run.run_id);
        assert_eq!(stored.source_path, "/data/sample.json.gz");
        assert_eq!(stored.source_sha256.as_deref(), Some("ab12"));
        assert_eq!(stored.records_inserted, 10);
        assert_eq!(stored.duplicates_skipped, 2);
        assert!(stored.finished_at.is_some());
    }
}
