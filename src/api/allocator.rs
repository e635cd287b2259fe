//! The aliased attachment allocator.
//!
//! [`AliasedAttachmentAllocator`] manages a pool of aliased heap pages for
//! transient frame-graph attachments. Per compile cycle it places every
//! activation into the first page that accepts it, grows the pool according
//! to the configured strategy, and retires wasteful pages with a latency
//! that respects frames still in flight.

use std::collections::HashMap;
use std::sync::Arc;

use crate::api::config::{AllocatorDescriptor, HeapAllocationStrategy};
use crate::api::stats::HeapMemoryUsage;
use crate::collector::PageCollector;
use crate::diagnostics::{self, AA001, AA002, AA003, AA004, AA005, AA101, AA901};
use crate::heap::no_alloc::NoAllocationHeap;
use crate::heap::page::{HeapPage, PageId};
use crate::heap::traits::{
    AliasedHeap, AliasedHeapDescriptor, AttachmentId, CompileFlags, Device, HeapResult,
    HeapStatistics, PlacedAttachment, ScopeId, TransientBufferDescriptor,
    TransientImageDescriptor,
};
use crate::util::size::{align_up, format_bytes};

/// Which heap is responsible for an active attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachmentOwner {
    Page(PageId),
    NoAllocation,
}

/// Pool of aliased heap pages for transient attachments.
///
/// Generic over the heap backend; see [`DummyAliasedHeap`] for a software
/// backend usable without a GPU.
///
/// [`DummyAliasedHeap`]: crate::heap::dummy::DummyAliasedHeap
pub struct AliasedAttachmentAllocator<H: AliasedHeap> {
    device: Arc<dyn Device>,
    descriptor: AllocatorDescriptor,
    pages: Vec<HeapPage<H>>,
    next_page_id: u64,
    no_allocation_heap: NoAllocationHeap,
    attachment_owners: HashMap<AttachmentId, AttachmentOwner>,
    memory_usage: Arc<HeapMemoryUsage>,
    collector: PageCollector<H>,
    compile_flags: CompileFlags,
    memory_usage_hint: u64,
    cycle_open: bool,
    shut_down: bool,
}

impl<H: AliasedHeap> AliasedAttachmentAllocator<H> {
    /// Create an allocator. The fixed strategy allocates its single page
    /// here; paging allocates its initial fraction of the budget; the
    /// memory-hint strategy starts empty.
    pub fn init(device: Arc<dyn Device>, descriptor: AllocatorDescriptor) -> HeapResult<Self> {
        descriptor.validate()?;

        let memory_usage = Arc::new(HeapMemoryUsage::new(descriptor.budget_in_bytes));
        let collect_latency = device.frame_count_max();
        let no_allocation_heap = NoAllocationHeap::init(
            &device,
            AliasedHeapDescriptor {
                name: format!("{} - No Allocation", descriptor.name),
                budget_in_bytes: u64::MAX,
                alignment_in_bytes: descriptor.alignment_in_bytes,
            },
        )?;

        let mut allocator = Self {
            device,
            descriptor,
            pages: Vec::new(),
            next_page_id: 0,
            no_allocation_heap,
            attachment_owners: HashMap::new(),
            memory_usage: Arc::clone(&memory_usage),
            collector: PageCollector::new(collect_latency, memory_usage),
            compile_flags: CompileFlags::NONE,
            memory_usage_hint: 0,
            cycle_open: false,
            shut_down: false,
        };

        match &allocator.descriptor.allocation_parameters {
            HeapAllocationStrategy::Fixed => {
                allocator.add_heap_page(allocator.descriptor.budget_in_bytes)?;
            }
            HeapAllocationStrategy::Paging(params) => {
                let initial = (allocator.descriptor.budget_in_bytes as f64
                    * params.initial_allocation_percentage as f64) as u64;
                if initial > 0 {
                    allocator.add_heap_page(initial)?;
                }
            }
            HeapAllocationStrategy::MemoryHint(_) => {}
        }

        Ok(allocator)
    }

    /// Open a compile cycle. `memory_usage_hint_in_bytes` feeds the
    /// memory-hint strategy's page sizing; callers typically pass the
    /// watermark reported by a preceding measurement cycle.
    pub fn begin(&mut self, flags: CompileFlags, memory_usage_hint_in_bytes: u64) {
        if self.shut_down {
            return;
        }
        self.compile_flags = flags;
        self.memory_usage_hint = memory_usage_hint_in_bytes;
        for page in &mut self.pages {
            page.heap.begin(flags);
        }
        if self.is_measuring() {
            self.no_allocation_heap.begin(flags);
        }
        self.cycle_open = true;
    }

    /// Place a transient buffer. `None` means the attachment could not be
    /// placed this cycle; a diagnostic explains why.
    pub fn activate_buffer(
        &mut self,
        descriptor: &TransientBufferDescriptor,
        scope: &ScopeId,
    ) -> Option<PlacedAttachment> {
        if !self.guard_activation(&descriptor.attachment_id) {
            return None;
        }

        // First fit over the existing pages. A measurement cycle scans them
        // too, so the measurement heap only accumulates the bytes no
        // existing page could provide.
        let mut winner = None;
        for page in &mut self.pages {
            if let Ok(placed) = page.heap.activate_buffer(descriptor, scope) {
                winner = Some((page.id, placed));
                break;
            }
        }
        if let Some((page_id, placed)) = winner {
            self.attachment_owners
                .insert(descriptor.attachment_id.clone(), AttachmentOwner::Page(page_id));
            return Some(placed);
        }

        if self.is_measuring() {
            return self.activate_in_no_allocation_heap(|heap| {
                heap.activate_buffer(descriptor, scope)
            }, &descriptor.attachment_id);
        }

        let requirements = self.device.buffer_memory_requirements(&descriptor.buffer);
        let min_size = align_up(
            requirements.size_in_bytes,
            requirements.alignment_in_bytes.max(1),
        );
        let page_id = self.grow_for(&descriptor.attachment_id, min_size)?;
        let page = self.pages.iter_mut().find(|p| p.id == page_id)?;
        match page.heap.activate_buffer(descriptor, scope) {
            Ok(placed) => {
                self.attachment_owners
                    .insert(descriptor.attachment_id.clone(), AttachmentOwner::Page(page_id));
                Some(placed)
            }
            Err(_) => {
                diagnostics::emit_with_context(
                    &AA901,
                    &format!(
                        "freshly created page rejected attachment '{}'",
                        descriptor.attachment_id
                    ),
                );
                None
            }
        }
    }

    /// Place a transient image. Same contract as [`activate_buffer`]; in
    /// addition, a successful placement evicts the image's cached placement
    /// from every page that did not win it.
    ///
    /// [`activate_buffer`]: Self::activate_buffer
    pub fn activate_image(
        &mut self,
        descriptor: &TransientImageDescriptor,
        scope: &ScopeId,
    ) -> Option<PlacedAttachment> {
        if !self.guard_activation(&descriptor.attachment_id) {
            return None;
        }

        let mut winner = None;
        for page in &mut self.pages {
            if let Ok(placed) = page.heap.activate_image(descriptor, scope) {
                winner = Some((page.id, placed));
                break;
            }
        }
        if let Some((page_id, placed)) = winner {
            self.finish_image_activation(&descriptor.attachment_id, page_id);
            return Some(placed);
        }

        if self.is_measuring() {
            return self.activate_in_no_allocation_heap(|heap| {
                heap.activate_image(descriptor, scope)
            }, &descriptor.attachment_id);
        }

        let requirements = self.device.image_memory_requirements(&descriptor.image);
        let min_size = align_up(
            requirements.size_in_bytes,
            requirements.alignment_in_bytes.max(1),
        );
        let page_id = self.grow_for(&descriptor.attachment_id, min_size)?;
        let page = self.pages.iter_mut().find(|p| p.id == page_id)?;
        match page.heap.activate_image(descriptor, scope) {
            Ok(placed) => {
                self.finish_image_activation(&descriptor.attachment_id, page_id);
                Some(placed)
            }
            Err(_) => {
                diagnostics::emit_with_context(
                    &AA901,
                    &format!(
                        "freshly created page rejected attachment '{}'",
                        descriptor.attachment_id
                    ),
                );
                None
            }
        }
    }

    /// Release a transient buffer after its last use in the cycle.
    pub fn deactivate_buffer(&mut self, attachment_id: &AttachmentId, scope: &ScopeId) {
        match self.attachment_owners.remove(attachment_id) {
            Some(AttachmentOwner::NoAllocation) => {
                self.no_allocation_heap.deactivate_buffer(attachment_id, scope);
            }
            Some(AttachmentOwner::Page(page_id)) => {
                if let Some(page) = self.pages.iter_mut().find(|p| p.id == page_id) {
                    page.heap.deactivate_buffer(attachment_id, scope);
                } else {
                    self.report_missing_page(attachment_id);
                }
            }
            None => self.report_unknown_attachment(attachment_id),
        }
    }

    /// Release a transient image after its last use in the cycle.
    pub fn deactivate_image(&mut self, attachment_id: &AttachmentId, scope: &ScopeId) {
        match self.attachment_owners.remove(attachment_id) {
            Some(AttachmentOwner::NoAllocation) => {
                self.no_allocation_heap.deactivate_image(attachment_id, scope);
            }
            Some(AttachmentOwner::Page(page_id)) => {
                if let Some(page) = self.pages.iter_mut().find(|p| p.id == page_id) {
                    page.heap.deactivate_image(attachment_id, scope);
                } else {
                    self.report_missing_page(attachment_id);
                }
            }
            None => self.report_unknown_attachment(attachment_id),
        }
    }

    /// Close the compile cycle. Allocation cycles run page compaction and
    /// the budget check; measurement cycles skip both.
    pub fn end(&mut self) {
        if self.shut_down {
            return;
        }
        for page in &mut self.pages {
            page.heap.end();
        }
        if self.is_measuring() {
            self.no_allocation_heap.end();
        } else {
            self.compact_heap_pages();
            if self.memory_usage.is_over_budget() {
                diagnostics::emit_with_context(
                    &AA101,
                    &format!(
                        "pool '{}': {} resident, budget {}",
                        self.descriptor.name,
                        format_bytes(self.memory_usage.resident_in_bytes()),
                        format_bytes(self.memory_usage.budget_in_bytes()),
                    ),
                );
            }
        }
        // Flags stay readable so statistics() can report the measurement
        // heap after a measurement cycle ends.
        self.cycle_open = false;
    }

    /// Run one garbage-collection pass. Call once per completed frame;
    /// retired pages are destroyed after `frame_count_max` passes.
    pub fn on_frame_end(&mut self) {
        if self.shut_down {
            return;
        }
        self.collector.collect();
    }

    /// Statistics for every live page, every page pending collection, and
    /// (after a measurement cycle) the measurement heap.
    pub fn statistics(&self) -> Vec<HeapStatistics> {
        let mut out = Vec::new();
        self.append_statistics(&mut out);
        out
    }

    /// Append this pool's statistics to `out`.
    pub fn append_statistics(&self, out: &mut Vec<HeapStatistics>) {
        for page in &self.pages {
            out.push(page.heap.statistics());
        }
        for page in self.collector.pending_pages() {
            out.push(page.heap.statistics());
        }
        if self.is_measuring() {
            out.push(self.no_allocation_heap.statistics());
        }
    }

    /// Release every page through the collector and drain it immediately.
    /// Safe only once the device is idle. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.attachment_owners.clear();
        for page in self.pages.drain(..) {
            self.collector.queue(page);
        }
        self.collector.collect_all();
        self.compile_flags = CompileFlags::NONE;
        self.cycle_open = false;
        self.shut_down = true;
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// The descriptor the allocator was created with.
    pub fn descriptor(&self) -> &AllocatorDescriptor {
        &self.descriptor
    }

    /// Number of live heap pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of retired pages still pending collection.
    pub fn pending_page_count(&self) -> usize {
        self.collector.pending_count()
    }

    /// Number of attachments currently holding a placement.
    pub fn active_attachment_count(&self) -> usize {
        self.attachment_owners.len()
    }

    /// Shared resident-memory counter for this pool.
    pub fn memory_usage(&self) -> &Arc<HeapMemoryUsage> {
        &self.memory_usage
    }

    /// Iterate the live page heaps, oldest first.
    pub fn page_heaps(&self) -> impl Iterator<Item = &H> {
        self.pages.iter().map(|page| &page.heap)
    }

    fn is_measuring(&self) -> bool {
        self.compile_flags
            .contains(CompileFlags::DONT_ALLOCATE_RESOURCES)
    }

    /// Activations require an open cycle; deactivations do not, so a
    /// mismatched deactivate can still report the more precise AA002.
    fn guard_activation(&self, attachment_id: &AttachmentId) -> bool {
        if !self.cycle_open || self.shut_down {
            diagnostics::emit_with_context(
                &AA001,
                &format!(
                    "attachment '{}' in pool '{}'",
                    attachment_id, self.descriptor.name
                ),
            );
            return false;
        }
        true
    }

    fn activate_in_no_allocation_heap(
        &mut self,
        activate: impl FnOnce(&mut NoAllocationHeap) -> HeapResult<PlacedAttachment>,
        attachment_id: &AttachmentId,
    ) -> Option<PlacedAttachment> {
        match activate(&mut self.no_allocation_heap) {
            Ok(placed) => {
                self.attachment_owners
                    .insert(attachment_id.clone(), AttachmentOwner::NoAllocation);
                Some(placed)
            }
            Err(err) => {
                diagnostics::emit_with_context(
                    &AA901,
                    &format!("measurement heap rejected '{}': {}", attachment_id, err),
                );
                None
            }
        }
    }

    /// Record the winning page for an image and evict its cached placement
    /// everywhere else, so stale placements cannot shadow the live one.
    fn finish_image_activation(&mut self, attachment_id: &AttachmentId, winner: PageId) {
        self.attachment_owners
            .insert(attachment_id.clone(), AttachmentOwner::Page(winner));
        for page in &mut self.pages {
            if page.id != winner {
                page.heap.remove_from_cache(attachment_id);
            }
        }
    }

    /// Create a page able to hold `min_size`, or emit the strategy-specific
    /// diagnostic and return `None`.
    fn grow_for(&mut self, attachment_id: &AttachmentId, min_size: u64) -> Option<PageId> {
        if self.descriptor.allocation_parameters.is_fixed() {
            diagnostics::emit_with_context(
                &AA003,
                &format!(
                    "attachment '{}' in pool '{}'",
                    attachment_id, self.descriptor.name
                ),
            );
            return None;
        }
        let page_size = self.calculate_heap_page_size(min_size);
        match self.add_heap_page(page_size) {
            Ok(page_id) => Some(page_id),
            Err(err) => {
                diagnostics::emit_with_context(
                    &AA005,
                    &format!(
                        "pool '{}', attachment '{}': {}",
                        self.descriptor.name, attachment_id, err
                    ),
                );
                None
            }
        }
    }

    /// Size for the next page. The memory-hint strategy targets the caller's
    /// hint minus what is already resident; paging uses its fixed page size.
    fn calculate_heap_page_size(&self, min_size: u64) -> u64 {
        let mut size = match &self.descriptor.allocation_parameters {
            HeapAllocationStrategy::MemoryHint(params) => self
                .memory_usage_hint
                .saturating_sub(self.memory_usage.resident_in_bytes())
                .max(params.min_heap_size_in_bytes),
            HeapAllocationStrategy::Paging(params) => params.page_size_in_bytes,
            HeapAllocationStrategy::Fixed => {
                diagnostics::emit(&AA004);
                return 0;
            }
        };
        if self.descriptor.budget_in_bytes > 0 {
            size = size.min(self.descriptor.budget_in_bytes);
        }
        size.max(min_size)
    }

    /// Create one heap page of (at least) `size_in_bytes`, scaled by the
    /// strategy's growth factor and aligned to the pool alignment.
    fn add_heap_page(&mut self, size_in_bytes: u64) -> HeapResult<PageId> {
        let scale = self
            .descriptor
            .allocation_parameters
            .heap_page_scale_factor();
        let scaled = (size_in_bytes as f64 * scale as f64) as u64;
        let budget = align_up(scaled, self.descriptor.alignment_in_bytes);

        let page_id = PageId(self.next_page_id);
        let page_name = format!("{} - Heap {}", self.descriptor.name, self.next_page_id);
        let mut heap = H::init(
            &self.device,
            AliasedHeapDescriptor {
                name: page_name.clone(),
                budget_in_bytes: budget,
                alignment_in_bytes: self.descriptor.alignment_in_bytes,
            },
        )?;
        heap.set_name(&page_name);
        if self.cycle_open {
            heap.begin(self.compile_flags);
        }

        self.next_page_id += 1;
        self.memory_usage.add_resident(budget);
        log::debug!("created heap page '{}' ({} bytes)", page_name, budget);
        self.pages.push(HeapPage::new(page_id, heap));
        Ok(page_id)
    }

    /// Retire pages that wasted too much of their budget for too many
    /// consecutive cycles. A non-empty retired page gets a replacement sized
    /// to its watermark; an empty one simply disappears.
    fn compact_heap_pages(&mut self) {
        let strategy = self.descriptor.allocation_parameters.clone();
        if strategy.is_fixed() {
            return;
        }
        let max_wasted = strategy.max_wasted_percentage();
        let collect_latency = strategy.collect_latency();
        let min_size = strategy.min_heap_size_in_bytes();

        let mut replacements = Vec::new();
        let mut index = 0;
        while index < self.pages.len() {
            let page = &mut self.pages[index];
            let stats = page.heap.statistics();
            let page_budget = page.heap.descriptor().budget_in_bytes;
            let empty = stats.watermark_in_bytes == 0;
            let shrinkable = page_budget > min_size || empty;

            if stats.wasted_percentage() >= max_wasted && shrinkable {
                page.collect_iteration += 1;
                if page.collect_iteration > collect_latency {
                    if !empty {
                        replacements.push(stats.watermark_in_bytes);
                    }
                    let retired = self.pages.remove(index);
                    self.collector.queue(retired);
                    continue;
                }
            } else {
                page.collect_iteration = 0;
            }
            index += 1;
        }

        // Replacements are sized to the retired page's watermark, not the
        // strategy's page formula: the point of the shrink is to keep only
        // what the page actually used.
        for watermark in replacements {
            if let Err(err) = self.add_heap_page(watermark) {
                diagnostics::emit_with_context(
                    &AA005,
                    &format!(
                        "pool '{}', compaction replacement: {}",
                        self.descriptor.name, err
                    ),
                );
            }
        }
    }

    fn report_unknown_attachment(&self, attachment_id: &AttachmentId) {
        diagnostics::emit_with_context(
            &AA002,
            &format!(
                "attachment '{}' in pool '{}'",
                attachment_id, self.descriptor.name
            ),
        );
    }

    fn report_missing_page(&self, attachment_id: &AttachmentId) {
        diagnostics::emit_with_context(
            &AA901,
            &format!("owning page of attachment '{}' no longer exists", attachment_id),
        );
    }
}

impl<H: AliasedHeap> Drop for AliasedAttachmentAllocator<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::dummy::{DummyAliasedHeap, DummyDevice};
    use crate::heap::traits::BufferDescriptor;
    use crate::util::size::mb;

    fn device() -> Arc<dyn Device> {
        Arc::new(DummyDevice::default())
    }

    fn buffer(name: &str, bytes: u64) -> TransientBufferDescriptor {
        TransientBufferDescriptor {
            attachment_id: AttachmentId::from(name),
            buffer: BufferDescriptor { byte_count: bytes },
        }
    }

    #[test]
    fn test_init_rejects_invalid_descriptor() {
        let descriptor = AllocatorDescriptor::new("pool")
            .with_strategy(HeapAllocationStrategy::Fixed);
        let result = AliasedAttachmentAllocator::<DummyAliasedHeap>::init(device(), descriptor);
        assert!(result.is_err());
    }

    #[test]
    fn test_fixed_creates_single_page_at_init() {
        let descriptor = AllocatorDescriptor::new("fixed pool")
            .with_budget(mb(16))
            .with_strategy(HeapAllocationStrategy::Fixed);
        let allocator =
            AliasedAttachmentAllocator::<DummyAliasedHeap>::init(device(), descriptor).unwrap();
        assert_eq!(allocator.page_count(), 1);
        assert_eq!(allocator.memory_usage().resident_in_bytes(), mb(16));
        assert_eq!(allocator.statistics()[0].name, "fixed pool - Heap 0");
    }

    #[test]
    fn test_activation_outside_cycle_returns_none() {
        let descriptor = AllocatorDescriptor::new("closed pool");
        let mut allocator =
            AliasedAttachmentAllocator::<DummyAliasedHeap>::init(device(), descriptor).unwrap();
        let scope = ScopeId::from("pass");
        let placed = allocator.activate_buffer(&buffer("a", 1024), &scope);
        assert!(placed.is_none());
        assert_eq!(allocator.active_attachment_count(), 0);
    }
}
