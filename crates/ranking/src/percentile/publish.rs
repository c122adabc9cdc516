//! Shared anchor table with atomic replacement

use super::{AnchorTable, PercentileEstimator};
use followrank_common::errors::Result;
use followrank_common::metrics;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Holds the anchor table readers estimate against.
///
/// Readers clone the `Arc` and never observe a half-built table: a publish
/// replaces the pointer in one step and in-flight estimates keep the table
/// they started with.
#[derive(Debug, Default)]
pub struct AnchorStore {
    current: RwLock<Option<Arc<AnchorTable>>>,
}

impl AnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: AnchorTable) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(table))),
        }
    }

    /// Swap in a new table, returning the previous one
    pub fn publish(&self, table: AnchorTable) -> Option<Arc<AnchorTable>> {
        let anchors = table.len();
        let next = Arc::new(table);
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            guard.replace(next)
        };

        metrics::record_anchor_publish(anchors);
        info!(anchors, "Anchor table published");
        previous
    }

    /// Snapshot of the current table
    pub fn current(&self) -> Option<Arc<AnchorTable>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Load a persisted table and publish it. On error the current table is
    /// left in place.
    pub fn publish_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let table = AnchorTable::load(path)?;
        self.publish(table);
        Ok(())
    }

    /// Persist the current table, if any
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<bool> {
        match self.current() {
            Some(table) => {
                table.save(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Estimate against the current table
    pub fn estimate(&self, score: f64, estimator: &PercentileEstimator) -> f64 {
        let table = self.current();
        estimator.estimate(score, table.as_deref())
    }
}
