// ==============================================================================
// config.rs - Ingestion Settings
// ==============================================================================
// Description: Tunables for a load run (batch size, dedup capacity)
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Records per bulk insert
pub const DEFAULT_BATCH_SIZE: usize = 5000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Deduplication capacity must be at least 1")]
    ZeroDedupCapacity,
}

/// Settings for one ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records accumulated before each bulk insert
    pub batch_size: usize,

    /// Maximum distinct variant IDs held by the deduplicator (None = unbounded)
    pub dedup_capacity: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dedup_capacity: None,
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_dedup_capacity(mut self, capacity: Option<usize>) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.dedup_capacity == Some(0) {
            return Err(ConfigError::ZeroDedupCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.batch_size, 5000);
        assert_eq!(config.dedup_capacity, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert_eq!(
            IngestConfig::new().with_batch_size(0).validate(),
            Err(ConfigError::ZeroBatchSize)
        );
        assert_eq!(
            IngestConfig::new().with_dedup_capacity(Some(0)).validate(),
            Err(ConfigError::ZeroDedupCapacity)
        );
    }
}
