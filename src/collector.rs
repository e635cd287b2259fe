//! Deferred heap page reclamation.
//!
//! A heap page removed by compaction may still back resources referenced by
//! frames the GPU has not finished. Pages therefore sit in a pending queue
//! and are destroyed only after `latency` collection passes, one pass per
//! completed frame.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::api::stats::HeapMemoryUsage;
use crate::heap::page::HeapPage;
use crate::heap::traits::AliasedHeap;

struct PendingPage<H> {
    page: HeapPage<H>,
    /// Collection passes survived so far.
    age: u32,
}

/// Queue of retired heap pages awaiting safe destruction.
pub(crate) struct PageCollector<H> {
    latency: u32,
    pending: VecDeque<PendingPage<H>>,
    memory_usage: Arc<HeapMemoryUsage>,
}

impl<H: AliasedHeap> PageCollector<H> {
    pub fn new(latency: u32, memory_usage: Arc<HeapMemoryUsage>) -> Self {
        Self {
            latency,
            pending: VecDeque::new(),
            memory_usage,
        }
    }

    /// Hand a retired page to the collector. Its memory stays resident until
    /// the page is released.
    pub fn queue(&mut self, page: HeapPage<H>) {
        self.pending.push_back(PendingPage { page, age: 0 });
    }

    /// One collection pass: age every pending page and release those older
    /// than the latency. Pages are queued in order, so releasable pages sit
    /// at the front.
    pub fn collect(&mut self) {
        for pending in &mut self.pending {
            pending.age += 1;
        }
        while self
            .pending
            .front()
            .map_or(false, |front| front.age > self.latency)
        {
            if let Some(pending) = self.pending.pop_front() {
                self.release(pending.page);
            }
        }
    }

    /// Release every pending page immediately, regardless of age. Only safe
    /// once the device is idle (shutdown).
    pub fn collect_all(&mut self) {
        while let Some(pending) = self.pending.pop_front() {
            self.release(pending.page);
        }
    }

    fn release(&mut self, page: HeapPage<H>) {
        let descriptor = page.heap.descriptor();
        self.memory_usage.release_resident(descriptor.budget_in_bytes);
        log::debug!(
            "released heap page '{}' ({} bytes)",
            descriptor.name,
            descriptor.budget_in_bytes
        );
        drop(page);
    }

    /// Heaps still waiting on their latency window.
    pub fn pending_pages(&self) -> impl Iterator<Item = &HeapPage<H>> {
        self.pending.iter().map(|pending| &pending.page)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::dummy::{DummyAliasedHeap, DummyDevice};
    use crate::heap::page::PageId;
    use crate::heap::traits::{AliasedHeapDescriptor, Device};
    use crate::util::size::mb;

    fn page(id: u64, budget: u64) -> HeapPage<DummyAliasedHeap> {
        let device: Arc<dyn Device> = Arc::new(DummyDevice::default());
        let heap = DummyAliasedHeap::init(
            &device,
            AliasedHeapDescriptor {
                name: format!("page {}", id),
                budget_in_bytes: budget,
                alignment_in_bytes: 256,
            },
        )
        .unwrap();
        HeapPage::new(PageId(id), heap)
    }

    #[test]
    fn test_page_survives_latency_window() {
        let usage = Arc::new(HeapMemoryUsage::new(0));
        usage.add_resident(mb(1));
        let mut collector = PageCollector::new(2, Arc::clone(&usage));
        collector.queue(page(0, mb(1)));

        collector.collect();
        collector.collect();
        assert_eq!(collector.pending_count(), 1);
        assert_eq!(usage.resident_in_bytes(), mb(1));

        collector.collect();
        assert_eq!(collector.pending_count(), 0);
        assert_eq!(usage.resident_in_bytes(), 0);
    }

    #[test]
    fn test_collect_all_drains_regardless_of_age() {
        let usage = Arc::new(HeapMemoryUsage::new(0));
        usage.add_resident(mb(3));
        let mut collector = PageCollector::new(3, Arc::clone(&usage));
        collector.queue(page(0, mb(1)));
        collector.queue(page(1, mb(2)));

        collector.collect_all();
        assert_eq!(collector.pending_count(), 0);
        assert_eq!(usage.resident_in_bytes(), 0);
    }

    #[test]
    fn test_zero_latency_releases_next_pass() {
        let usage = Arc::new(HeapMemoryUsage::new(0));
        usage.add_resident(mb(1));
        let mut collector = PageCollector::new(0, Arc::clone(&usage));
        collector.queue(page(0, mb(1)));

        collector.collect();
        assert_eq!(collector.pending_count(), 0);
    }
}
