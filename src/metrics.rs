//! Store operation metrics.
//!
//! Every query and record mutation the store executes is counted here,
//! split by kind (schema creation and transaction control excepted).
//! The counters back the cache/store equivalence guarantees ("prefetch then
//! read everything issues zero further queries") and are cheap enough to
//! stay on in production.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-store operation counters.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Number of SELECT statements executed
    queries: AtomicUsize,

    /// Number of INSERT statements executed
    inserts: AtomicUsize,

    /// Number of UPDATE statements executed
    updates: AtomicUsize,

    /// Number of DELETE statements executed
    deletes: AtomicUsize,

    /// Number of create-path uniqueness conflicts recovered as updates
    conflicts: AtomicUsize,
}

impl StoreMetrics {
    /// Record an executed SELECT.
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an executed INSERT.
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an executed UPDATE.
    pub fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an executed DELETE.
    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a uniqueness conflict recovered on the create path.
    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Current SELECT count.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    /// Current INSERT count.
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Current UPDATE count.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::Relaxed)
    }

    /// Current DELETE count.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Current recovered-conflict count.
    pub fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Generate a point-in-time report.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            queries: self.queries(),
            inserts: self.inserts(),
            updates: self.updates(),
            deletes: self.deletes(),
            conflicts: self.conflicts(),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.queries.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.updates.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.conflicts.store(0, Ordering::Relaxed);
    }
}

/// Serializable snapshot of a [`StoreMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    pub queries: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub conflicts: usize,
}
