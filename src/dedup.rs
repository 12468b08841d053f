// ==============================================================================
// dedup.rs - Run-Scoped Variant Deduplication
// ==============================================================================
// Description: Tracks which variant IDs have been seen during one ingestion run
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Key: `vid` only (chromosome is ignored). The first occurrence wins; every
// later occurrence in the same run is skipped, wherever it appears.
// Scope: one run. The pipeline calls `reset()` before it starts reading.
// ==============================================================================

use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DedupError {
    #[error("Deduplication capacity exceeded: {limit} distinct variant IDs")]
    CapacityExceeded { limit: usize },
}

/// Membership service for variant IDs seen in the current run
pub trait Deduplicator {
    /// Record `vid`; returns true only the first time it is offered
    fn first_occurrence(&mut self, vid: &str) -> Result<bool, DedupError>;

    /// Number of distinct IDs recorded
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every recorded ID
    fn reset(&mut self);
}

/// Exact in-memory deduplicator
///
/// Memory grows with the number of distinct IDs in the input. An optional
/// capacity limit turns unbounded growth into a hard error.
#[derive(Debug, Default)]
pub struct InMemoryDeduplicator {
    seen: HashSet<String>,
    capacity_limit: Option<usize>,
}

impl InMemoryDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail once more than `limit` distinct IDs would be held
    pub fn with_capacity_limit(mut self, limit: usize) -> Self {
        self.capacity_limit = Some(limit);
        self
    }
}

impl Deduplicator for InMemoryDeduplicator {
    fn first_occurrence(&mut self, vid: &str) -> Result<bool, DedupError> {
        if self.seen.contains(vid) {
            return Ok(false);
        }

        if let Some(limit) = self.capacity_limit {
            if self.seen.len() >= limit {
                return Err(DedupError::CapacityExceeded { limit });
            }
        }

        self.seen.insert(vid.to_string());
        Ok(true)
    }

    fn len(&self) -> usize {
        self.seen.len()
    }

    fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_only() {
        let mut dedup = InMemoryDeduplicator::new();

        assert!(dedup.first_occurrence("1-100-A-G").unwrap());
        assert!(dedup.first_occurrence("1-200-C-T").unwrap());
        assert!(!dedup.first_occurrence("1-100-A-G").unwrap());
        assert!(!dedup.first_occurrence("1-100-A-G").unwrap());
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_reset_starts_a_new_run() {
        let mut dedup = InMemoryDeduplicator::new();
        dedup.first_occurrence("x").unwrap();
        dedup.reset();

        assert!(dedup.is_empty());
        assert!(dedup.first_occurrence("x").unwrap());
    }

    #[test]
    fn test_capacity_limit() {
        let mut dedup = InMemoryDeduplicator::new().with_capacity_limit(2);

        assert!(dedup.first_occurrence("a").unwrap());
        assert!(dedup.first_occurrence("b").unwrap());
        // Repeats never count against the limit
        assert!(!dedup.first_occurrence("a").unwrap());
        assert_eq!(
            dedup.first_occurrence("c"),
            Err(DedupError::CapacityExceeded { limit: 2 })
        );
    }
}
