//! Pool-level memory accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared resident-memory counter for one allocator pool.
///
/// The allocator adds on page creation; the collector subtracts when a
/// retired page is finally destroyed, so the resident figure includes pages
/// still in their latency window. The budget is advisory: exceeding it
/// produces a diagnostic, never a failure.
#[derive(Debug)]
pub struct HeapMemoryUsage {
    budget_in_bytes: u64,
    total_resident_in_bytes: AtomicU64,
}

impl HeapMemoryUsage {
    /// Create a counter with the given advisory budget (0 = unbounded).
    pub fn new(budget_in_bytes: u64) -> Self {
        Self {
            budget_in_bytes,
            total_resident_in_bytes: AtomicU64::new(0),
        }
    }

    /// The advisory budget in bytes; 0 means unbounded.
    pub fn budget_in_bytes(&self) -> u64 {
        self.budget_in_bytes
    }

    /// Bytes currently resident, pending pages included.
    pub fn resident_in_bytes(&self) -> u64 {
        self.total_resident_in_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn add_resident(&self, bytes: u64) {
        self.total_resident_in_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn release_resident(&self, bytes: u64) {
        let mut current = self.total_resident_in_bytes.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_sub(bytes);
            match self.total_resident_in_bytes.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Whether residency currently exceeds a non-zero budget.
    pub fn is_over_budget(&self) -> bool {
        self.budget_in_bytes != 0 && self.resident_in_bytes() > self.budget_in_bytes
    }
}
