//! Narrow storage seam for persisted samples
//!
//! The real storage engine (a relational table with scheduled cleanup in
//! the original deployment) lives outside the core. This seam is just wide
//! enough for the core's needs: insert one sample per request, read recent
//! history for aggregation, purge by age, clear. Writes at end-of-request
//! are fire-and-forget; callers log and drop failures.

use crate::reporter::PersistedSample;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sample store unavailable: {0}")]
    Unavailable(String),
    #[error("sample store I/O error")]
    Io(#[from] std::io::Error),
}

/// A sample as stored: the record plus the store-assigned timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSample {
    pub sample: PersistedSample,
    /// Unix seconds, set by the store at insert time
    pub timestamp: f64,
}

pub trait SampleStore {
    /// Insert one sample, stamping it with the store's clock
    fn insert(&mut self, sample: PersistedSample) -> Result<(), StoreError>;

    /// Most recent samples, newest first, at most `limit`
    fn recent(&self, limit: usize) -> Vec<StoredSample>;

    /// Delete samples older than `max_age_secs`; returns how many
    fn purge_older_than(&mut self, max_age_secs: f64) -> Result<usize, StoreError>;

    /// Delete everything
    fn clear(&mut self) -> Result<(), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// In-memory store for tests and the replay binary
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<StoredSample>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit timestamp, for deterministic tests
    pub fn insert_at(&mut self, sample: PersistedSample, timestamp: f64) {
        self.rows.push(StoredSample { sample, timestamp });
    }

    pub fn rows(&self) -> &[StoredSample] {
        &self.rows
    }
}

impl SampleStore for MemoryStore {
    fn insert(&mut self, sample: PersistedSample) -> Result<(), StoreError> {
        self.insert_at(sample, unix_now());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Vec<StoredSample> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            b.timestamp
                .partial_cmp(&a.timestamp)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows.truncate(limit);
        rows
    }

    fn purge_older_than(&mut self, max_age_secs: f64) -> Result<usize, StoreError> {
        let cutoff = unix_now() - max_age_secs;
        let before = self.rows.len();
        self.rows.retain(|row| row.timestamp >= cutoff);
        Ok(before - self.rows.len())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.rows.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}
