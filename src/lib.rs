// ==============================================================================
// lib.rs - Variant Store Library
// ==============================================================================
// Description: Library interface for variant ingestion and query modules
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod parsers;
pub mod models;
pub mod normalizer;
pub mod validator;
pub mod dedup;
pub mod config;
pub mod audit;
pub mod store;
pub mod ingest;
pub mod query;
pub mod report;

#[cfg(test)]
mod test_support;

pub use config::IngestConfig;
pub use ingest::{ingest_file, IngestError, IngestPipeline, IngestSummary};
pub use query::{QueryEngine, QueryError, VariantPage, VariantQuery};
pub use report::VariantReport;
pub use store::{StoreError, VariantStore};
