//! Write-behind persistence.
//!
//! The mirror holds the last snapshot the backend accepted and the latest
//! in-memory snapshot. Collections that differ are dirty; once changes have
//! been quiet for the debounce window they are flushed together. A failed
//! flush leaves everything dirty so the next one resends it.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::snapshot::{DirtySet, Snapshot};
use crate::store::{Backend, StoreResult};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

/// Minimum wait before a failed batch is offered again.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WriteBehind {
    baseline: Snapshot,
    latest: Snapshot,
    dirty: DirtySet,
    debounce: Duration,
    last_change: Option<Instant>,
    retry_at: Option<Instant>,
}

impl WriteBehind {
    pub fn new(baseline: Snapshot, debounce: Duration) -> Self {
        Self {
            latest: baseline.clone(),
            baseline,
            dirty: DirtySet::new(),
            debounce,
            last_change: None,
            retry_at: None,
        }
    }

    /// Records a new in-memory snapshot and restarts the debounce window
    /// when it differs from what was last persisted.
    pub fn observe(&mut self, next: Snapshot, now: Instant) {
        if next == self.latest {
            return;
        }
        self.latest = next;
        self.dirty = self.baseline.changed_collections(&self.latest);
        self.last_change = if self.dirty.is_empty() {
            None
        } else {
            Some(now)
        };
        debug!(dirty = ?self.dirty, "observed state change");
    }

    pub fn pending(&self) -> &DirtySet {
        &self.dirty
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// When the pending batch becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        if self.dirty.is_empty() {
            return None;
        }
        let debounced = self.last_change.map(|changed| changed + self.debounce);
        match (debounced, self.retry_at) {
            (Some(debounced), Some(retry_at)) => Some(debounced.max(retry_at)),
            (debounced, retry_at) => debounced.or(retry_at),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) => now >= deadline,
            None => self.has_pending(),
        }
    }

    /// Sends every dirty collection in one batch. On failure the batch
    /// stays dirty and the error is returned after being logged.
    #[tracing::instrument(skip(self, backend), fields(backend = %backend.describe()))]
    pub async fn flush<B: Backend>(&mut self, backend: &B) -> StoreResult<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }

        match backend
            .persist(&self.baseline, &self.latest, &self.dirty)
            .await
        {
            Ok(()) => {
                debug!(flushed = ?self.dirty, "flushed dirty collections");
                self.baseline = self.latest.clone();
                self.dirty.clear();
                self.last_change = None;
                self.retry_at = None;
                Ok(())
            }
            Err(error) => {
                warn!(
                    error = %error,
                    dirty = ?self.dirty,
                    "flush failed; keeping collections dirty for retry"
                );
                self.retry_at = Some(Instant::now() + RETRY_DELAY);
                Err(error)
            }
        }
    }

    /// Forgets pending work and treats `baseline` as persisted.
    pub fn reset(&mut self, baseline: Snapshot) {
        self.latest = baseline.clone();
        self.baseline = baseline;
        self.dirty.clear();
        self.last_change = None;
        self.retry_at = None;
    }
}
