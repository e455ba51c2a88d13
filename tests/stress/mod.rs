//! Stress tests for callguard
//!
//! Each module hammers one building block from many threads or tasks and then
//! checks that counters and slots still add up.

pub mod circuitbreaker;
pub mod ratelimiter;
pub mod tenants;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records the highest number of callers seen inside a section at once.
#[derive(Default)]
pub struct ConcurrencyTracker {
    inside: AtomicUsize,
    high_water: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    pub fn enter(&self) {
        let now = self.inside.fetch_add(1, Ordering::AcqRel) + 1;
        self.high_water.fetch_max(now, Ordering::AcqRel);
    }

    pub fn exit(&self) {
        self.inside.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn peak(&self) -> usize {
        self.high_water.load(Ordering::Acquire)
    }
}
