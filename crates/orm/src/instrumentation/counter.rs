//! Round-trip counting

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::statement::{StatementPurpose, StatementShape};

/// Count plus statement shapes since the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTripRecord {
    pub count: u64,
    pub shapes: Vec<StatementShape>,
}

impl RoundTripRecord {
    pub fn count_by_purpose(&self, purpose: StatementPurpose) -> u64 {
        self.shapes.iter().filter(|s| s.purpose == purpose).count() as u64
    }
}

/// Position in the counter's log, see [`RoundTripCounter::since`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    epoch: u64,
    position: u64,
}

/// Observer of statements dispatched to the store.
///
/// The counter never issues or suppresses a statement; the storage-access
/// layer calls [`record_statement`](Self::record_statement) once per dispatch.
/// Counts are meaningful per unit of work: reset before it, read after it.
#[derive(Debug, Default)]
pub struct RoundTripCounter {
    count: AtomicU64,
    lazy_count: AtomicU64,
    epoch: AtomicU64,
    warned: AtomicBool,
    n_plus_one_threshold: Option<u64>,
    log: Mutex<Vec<StatementShape>>,
}

impl RoundTripCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a warning once this many lazy statements were recorded since the
    /// last reset
    pub fn with_n_plus_one_threshold(mut self, threshold: Option<u64>) -> Self {
        self.n_plus_one_threshold = threshold;
        self
    }

    pub fn reset(&self) {
        let mut log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        log.clear();
        self.count.store(0, Ordering::SeqCst);
        self.lazy_count.store(0, Ordering::SeqCst);
        self.warned.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_statement(&self, shape: StatementShape) {
        let purpose = shape.purpose;
        {
            let mut log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            tracing::trace!(statement = %shape, "round trip recorded");
            log.push(shape);
            self.count.fetch_add(1, Ordering::SeqCst);
        }

        if purpose == StatementPurpose::Lazy {
            let lazy = self.lazy_count.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(threshold) = self.n_plus_one_threshold {
                if lazy >= threshold && !self.warned.swap(true, Ordering::SeqCst) {
                    tracing::warn!(
                        lazy_statements = lazy,
                        threshold,
                        "Possible N+1 query pattern: {} lazy loads since reset",
                        lazy
                    );
                }
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn count_by_purpose(&self, purpose: StatementPurpose) -> u64 {
        if purpose == StatementPurpose::Lazy {
            return self.lazy_count.load(Ordering::SeqCst);
        }
        let log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        log.iter().filter(|s| s.purpose == purpose).count() as u64
    }

    pub fn snapshot(&self) -> RoundTripRecord {
        let log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        RoundTripRecord {
            count: self.count(),
            shapes: log.clone(),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            epoch: self.epoch.load(Ordering::SeqCst),
            position: self.count(),
        }
    }

    /// Statements recorded after `checkpoint`. A reset in between discards the
    /// checkpoint's position, so everything since the reset is returned.
    pub fn since(&self, checkpoint: Checkpoint) -> RoundTripRecord {
        let log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let start = if checkpoint.epoch == self.epoch.load(Ordering::SeqCst) {
            checkpoint.position as usize
        } else {
            0
        };
        let shapes: Vec<StatementShape> = log.iter().skip(start).cloned().collect();
        RoundTripRecord {
            count: shapes.len() as u64,
            shapes,
        }
    }
}
