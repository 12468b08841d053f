// ==============================================================================
// query.rs - Variant Query Engine
// ==============================================================================
// Description: Filtered, counted, paginated queries over the variant store
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Filters AND across categories, OR within a list. Each list filter joins the
// matching membership table; rows are DISTINCT after the joins.
// Order: chromosome, begin_pos, variant_index, vid (all ascending).
// ==============================================================================

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::VariantRecord;
use crate::store::{record_from_row, variant_column_list, MembershipTable, StoreError, VariantStore};

/// Rows per page when the caller does not say otherwise
pub const DEFAULT_LIMIT: u64 = 20;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to open variant store: {0}")]
    Store(#[from] StoreError),

    #[error("Query task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Filter and paging parameters of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantQuery {
    /// Exact gene symbol
    pub gene: Option<String>,
    /// Acceptable germline classifications (any of)
    pub clinvar: Option<Vec<String>>,
    /// Acceptable consequence terms (any of)
    pub consequences: Option<Vec<String>>,
    /// Inclusive upper bound on gnomAD allele frequency
    pub max_gnomad_freq: Option<f64>,
    pub limit: u64,
    pub offset: u64,
}

impl Default for VariantQuery {
    fn default() -> Self {
        Self {
            gene: None,
            clinvar: None,
            consequences: None,
            max_gnomad_freq: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl VariantQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gene(mut self, gene: impl Into<String>) -> Self {
        self.gene = Some(gene.into());
        self
    }

    pub fn with_clinvar<I, S>(mut self, classifications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clinvar = Some(classifications.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_consequences<I, S>(mut self, consequences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.consequences = Some(consequences.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_gnomad_freq(mut self, max: f64) -> Self {
        self.max_gnomad_freq = Some(max);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Reject filters that cannot be applied as given
    pub fn validate(&self) -> Result<(), QueryError> {
        if let Some(gene) = &self.gene {
            if gene.trim().is_empty() {
                return Err(QueryError::InvalidFilter("gene symbol is empty".into()));
            }
        }

        validate_list("clinvar", self.clinvar.as_deref())?;
        validate_list("consequence", self.consequences.as_deref())?;

        if let Some(max) = self.max_gnomad_freq {
            if !max.is_finite() || max < 0.0 {
                return Err(QueryError::InvalidFilter(format!(
                    "max gnomAD frequency must be a non-negative number, got {max}"
                )));
            }
        }

        if self.limit == 0 {
            return Err(QueryError::InvalidFilter("limit must be at least 1".into()));
        }
        if i64::try_from(self.limit).is_err() {
            return Err(QueryError::InvalidFilter(format!("limit {} is too large", self.limit)));
        }
        if i64::try_from(self.offset).is_err() {
            return Err(QueryError::InvalidFilter(format!("offset {} is too large", self.offset)));
        }

        Ok(())
    }
}

fn validate_list(name: &str, values: Option<&[String]>) -> Result<(), QueryError> {
    let Some(values) = values else {
        return Ok(());
    };
    if values.is_empty() {
        return Err(QueryError::InvalidFilter(format!("{name} list is empty")));
    }
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(QueryError::InvalidFilter(format!(
            "{name} list contains an empty value"
        )));
    }
    Ok(())
}

/// One page of matching records plus the total match count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPage {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub records: Vec<VariantRecord>,
}

/// FROM/JOIN/WHERE shared by the count and the page
struct QueryPlan {
    from: String,
    params: Vec<Value>,
}

impl QueryPlan {
    fn build(query: &VariantQuery) -> Self {
        let mut from = String::from("FROM variants AS v");
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        let mut join = |table: MembershipTable, alias: &str, values: &[String]| {
            from.push_str(&format!(
                " JOIN {table} AS {alias} ON {alias}.vid = v.vid AND {alias}.chromosome = v.chromosome",
                table = table.table_name(),
            ));
            let placeholders = vec!["?"; values.len()].join(", ");
            conditions.push(format!(
                "{alias}.{column} IN ({placeholders})",
                column = table.value_column()
            ));
            params.extend(values.iter().cloned().map(Value::Text));
        };

        if let Some(gene) = &query.gene {
            join(MembershipTable::Genes, "g", std::slice::from_ref(gene));
        }
        if let Some(clinvar) = &query.clinvar {
            join(MembershipTable::Classifications, "c", clinvar);
        }
        if let Some(consequences) = &query.consequences {
            join(MembershipTable::Consequences, "tc", consequences);
        }

        if let Some(max) = query.max_gnomad_freq {
            conditions.push("v.gnomad_af <= ?".to_string());
            params.push(Value::Real(max));
        }

        if !conditions.is_empty() {
            from.push_str(" WHERE ");
            from.push_str(&conditions.join(" AND "));
        }

        Self { from, params }
    }
}

/// Run `query` on an open connection
///
/// Count and page are read inside one transaction, so both see the same
/// snapshot of the store.
pub fn execute_query(conn: &Connection, query: &VariantQuery) -> Result<VariantPage, QueryError> {
    query.validate()?;
    let plan = QueryPlan::build(query);

    let count_sql = format!(
        "SELECT COUNT(*) FROM (SELECT DISTINCT v.vid, v.chromosome {})",
        plan.from
    );
    let page_sql = format!(
        "SELECT DISTINCT {columns} {from}
         ORDER BY v.chromosome ASC, v.begin_pos ASC, v.variant_index ASC, v.vid ASC
         LIMIT ? OFFSET ?",
        columns = variant_column_list(Some("v")),
        from = plan.from,
    );
    debug!("Count query: {}", count_sql);
    debug!("Page query: {}", page_sql);

    let mut page_params = plan.params.clone();
    page_params.push(Value::Integer(query.limit as i64));
    page_params.push(Value::Integer(query.offset as i64));

    let tx = conn.unchecked_transaction()?;

    let total: i64 = tx.query_row(&count_sql, params_from_iter(plan.params.iter()), |row| {
        row.get(0)
    })?;

    let records = {
        let mut stmt = tx.prepare(&page_sql)?;
        let rows = stmt.query_map(params_from_iter(page_params.iter()), record_from_row)?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    tx.commit()?;

    Ok(VariantPage {
        total: total as u64,
        offset: query.offset,
        limit: query.limit,
        records,
    })
}

/// Read-only query front end over a store file
///
/// Each call opens its own read-only connection, so queries may run
/// concurrently with each other and with a load.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    db_path: PathBuf,
}

impl QueryEngine {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn query(&self, query: &VariantQuery) -> Result<VariantPage, QueryError> {
        log_filters(query);

        let store = VariantStore::open_read_only(&self.db_path)?;
        let page = execute_query(store.connection(), query)?;

        info!(
            "Fetched {} of {} variants starting at offset {}",
            page.records.len(),
            page.total,
            page.offset
        );
        Ok(page)
    }

    /// `query` on tokio's blocking pool
    pub async fn query_async(&self, query: VariantQuery) -> Result<VariantPage, QueryError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.query(&query)).await?
    }
}

fn log_filters(query: &VariantQuery) {
    info!("Querying variants with filters:");
    if let Some(gene) = &query.gene {
        info!("  Gene: {}", gene);
    }
    if let Some(clinvar) = &query.clinvar {
        info!("  ClinVar: {}", clinvar.join(", "));
    }
    if let Some(consequences) = &query.consequences {
        info!("  Consequence: {}", consequences.join(", "));
    }
    if let Some(max) = query.max_gnomad_freq {
        info!("  Max gnomAD frequency: {}", max);
    }
    info!("  Limit: {}, Offset: {}", query.limit, query.offset);
}
