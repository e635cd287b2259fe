//! Measurement-only heap.
//!
//! `NoAllocationHeap` honours the full [`AliasedHeap`] contract but never
//! creates driver resources: every activation trivially succeeds and only
//! updates occupancy counters. A compile cycle run against it (the
//! `DONT_ALLOCATE_RESOURCES` flag) yields, via the high-water mark, the
//! exact extra bytes a real pass would have needed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::heap::traits::{
    AliasedHeap, AliasedHeapDescriptor, AttachmentId, CompileFlags, Device, HeapResult,
    HeapStatistics, PlacedAttachment, ScopeId, TransientBufferDescriptor,
    TransientImageDescriptor,
};
use crate::util::size::align_up;

/// A heap that tracks requested sizes without allocating.
pub struct NoAllocationHeap {
    device: Arc<dyn Device>,
    descriptor: AliasedHeapDescriptor,
    active: HashMap<AttachmentId, u64>,
    current_in_bytes: u64,
    watermark_in_bytes: u64,
    allocation_count: u64,
}

impl NoAllocationHeap {
    /// Peak simultaneous byte requirement seen this cycle.
    pub fn watermark_in_bytes(&self) -> u64 {
        self.watermark_in_bytes
    }

    fn track(&mut self, attachment_id: &AttachmentId, size_in_bytes: u64) -> PlacedAttachment {
        let size = align_up(size_in_bytes, self.descriptor.alignment_in_bytes);
        self.active.insert(attachment_id.clone(), size);
        self.current_in_bytes += size;
        self.watermark_in_bytes = self.watermark_in_bytes.max(self.current_in_bytes);
        self.allocation_count += 1;
        PlacedAttachment {
            heap_offset: 0,
            byte_count: size,
        }
    }

    fn untrack(&mut self, attachment_id: &AttachmentId) {
        if let Some(size) = self.active.remove(attachment_id) {
            self.current_in_bytes -= size;
        }
    }
}

impl AliasedHeap for NoAllocationHeap {
    fn init(device: &Arc<dyn Device>, descriptor: AliasedHeapDescriptor) -> HeapResult<Self> {
        Ok(Self {
            device: Arc::clone(device),
            descriptor,
            active: HashMap::new(),
            current_in_bytes: 0,
            watermark_in_bytes: 0,
            allocation_count: 0,
        })
    }

    fn begin(&mut self, _flags: CompileFlags) {
        self.active.clear();
        self.current_in_bytes = 0;
        self.watermark_in_bytes = 0;
        self.allocation_count = 0;
    }

    fn end(&mut self) {}

    fn activate_buffer(
        &mut self,
        descriptor: &TransientBufferDescriptor,
        _scope: &ScopeId,
    ) -> HeapResult<PlacedAttachment> {
        let requirements = self.device.buffer_memory_requirements(&descriptor.buffer);
        let size = align_up(
            requirements.size_in_bytes,
            requirements.alignment_in_bytes.max(1),
        );
        Ok(self.track(&descriptor.attachment_id, size))
    }

    fn activate_image(
        &mut self,
        descriptor: &TransientImageDescriptor,
        _scope: &ScopeId,
    ) -> HeapResult<PlacedAttachment> {
        let requirements = self.device.image_memory_requirements(&descriptor.image);
        let size = align_up(
            requirements.size_in_bytes,
            requirements.alignment_in_bytes.max(1),
        );
        Ok(self.track(&descriptor.attachment_id, size))
    }

    fn deactivate_buffer(&mut self, attachment_id: &AttachmentId, _scope: &ScopeId) {
        self.untrack(attachment_id);
    }

    fn deactivate_image(&mut self, attachment_id: &AttachmentId, _scope: &ScopeId) {
        self.untrack(attachment_id);
    }

    fn remove_from_cache(&mut self, _attachment_id: &AttachmentId) {}

    fn statistics(&self) -> HeapStatistics {
        // The watermark doubles as the heap size: it is the answer the
        // two-pass protocol exists to produce.
        HeapStatistics {
            name: self.descriptor.name.clone(),
            heap_size_in_bytes: self.watermark_in_bytes,
            watermark_in_bytes: self.watermark_in_bytes,
            allocation_count: self.allocation_count,
        }
    }

    fn descriptor(&self) -> &AliasedHeapDescriptor {
        &self.descriptor
    }

    fn set_name(&mut self, name: &str) {
        self.descriptor.name = name.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::dummy::DummyDevice;
    use crate::heap::traits::BufferDescriptor;

    fn heap() -> NoAllocationHeap {
        let device: Arc<dyn Device> = Arc::new(DummyDevice::default());
        let descriptor = AliasedHeapDescriptor {
            name: String::from("measure"),
            budget_in_bytes: u64::MAX,
            alignment_in_bytes: 256,
        };
        NoAllocationHeap::init(&device, descriptor).unwrap()
    }

    fn buffer(name: &str, bytes: u64) -> TransientBufferDescriptor {
        TransientBufferDescriptor {
            attachment_id: AttachmentId::from(name),
            buffer: BufferDescriptor { byte_count: bytes },
        }
    }

    #[test]
    fn test_watermark_tracks_peak_not_total() {
        let mut heap = heap();
        let scope = ScopeId::from("pass");
        heap.begin(CompileFlags::DONT_ALLOCATE_RESOURCES);

        heap.activate_buffer(&buffer("a", 1024), &scope).unwrap();
        heap.activate_buffer(&buffer("b", 2048), &scope).unwrap();
        heap.deactivate_buffer(&AttachmentId::from("a"), &scope);
        // Non-overlapping with "a": must not raise the peak past a+b.
        heap.activate_buffer(&buffer("c", 512), &scope).unwrap();

        assert_eq!(heap.watermark_in_bytes(), 1024 + 2048);
        assert_eq!(heap.statistics().heap_size_in_bytes, 1024 + 2048);
        assert_eq!(heap.statistics().allocation_count, 3);
    }

    #[test]
    fn test_begin_resets_cycle_state() {
        let mut heap = heap();
        let scope = ScopeId::from("pass");
        heap.begin(CompileFlags::DONT_ALLOCATE_RESOURCES);
        heap.activate_buffer(&buffer("a", 4096), &scope).unwrap();

        heap.begin(CompileFlags::DONT_ALLOCATE_RESOURCES);
        assert_eq!(heap.watermark_in_bytes(), 0);
        assert_eq!(heap.statistics().allocation_count, 0);
    }
}
