//! Software aliased heap implementation.
//!
//! This backend performs real placement bookkeeping (first-fit inside the
//! page budget, watermark, image placement cache, aliasing transitions)
//! without touching any GPU API. It backs the test suite and benches and
//! serves as a reference for platform backends.

use std::collections::HashMap;
use std::sync::Arc;

use crate::heap::barrier::{AliasingBarrierTracker, AliasingTransition};
use crate::heap::traits::{
    AliasedHeap, AliasedHeapDescriptor, AttachmentId, BufferDescriptor, CompileFlags, Device,
    HeapError, HeapResult, HeapStatistics, ImageDescriptor, PlacedAttachment,
    ResourceMemoryRequirements, ScopeId, TransientBufferDescriptor, TransientImageDescriptor,
};
use crate::util::size::{align_up, kb};

/// A device that answers sizing queries with simple arithmetic.
#[derive(Debug, Clone)]
pub struct DummyDevice {
    frame_count_max: u32,
    buffer_alignment: u64,
    image_alignment: u64,
}

impl DummyDevice {
    /// Create a device with the given frames-in-flight count.
    pub fn new(frame_count_max: u32) -> Self {
        Self {
            frame_count_max,
            buffer_alignment: 256,
            image_alignment: kb(4),
        }
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Device for DummyDevice {
    fn buffer_memory_requirements(
        &self,
        descriptor: &BufferDescriptor,
    ) -> ResourceMemoryRequirements {
        ResourceMemoryRequirements {
            size_in_bytes: align_up(descriptor.byte_count.max(1), self.buffer_alignment),
            alignment_in_bytes: self.buffer_alignment,
        }
    }

    fn image_memory_requirements(
        &self,
        descriptor: &ImageDescriptor,
    ) -> ResourceMemoryRequirements {
        let bytes_per_pixel = descriptor.format.bytes_per_pixel();
        let mut total = 0u64;
        for mip in 0..descriptor.mip_levels.max(1) {
            let width = (descriptor.width >> mip).max(1) as u64;
            let height = (descriptor.height >> mip).max(1) as u64;
            let depth = (descriptor.depth >> mip).max(1) as u64;
            total += width * height * depth * bytes_per_pixel;
        }
        total *= descriptor.sample_count.max(1) as u64;
        ResourceMemoryRequirements {
            size_in_bytes: align_up(total, self.image_alignment),
            alignment_in_bytes: self.image_alignment,
        }
    }

    fn frame_count_max(&self) -> u32 {
        self.frame_count_max
    }
}

#[derive(Debug, Clone, Copy)]
struct Region {
    offset: u64,
    size: u64,
}

struct Placement {
    id: AttachmentId,
    region: Region,
}

/// Software heap page with first-fit placement.
pub struct DummyAliasedHeap {
    device: Arc<dyn Device>,
    descriptor: AliasedHeapDescriptor,
    /// Active placements, sorted by offset.
    active: Vec<Placement>,
    /// Speculative placements remembered for deactivated images.
    image_cache: HashMap<AttachmentId, Region>,
    barriers: AliasingBarrierTracker,
    watermark_in_bytes: u64,
    allocation_count: u64,
}

impl DummyAliasedHeap {
    /// Aliasing transitions recorded this cycle.
    pub fn aliasing_transitions(&self) -> &[AliasingTransition] {
        self.barriers.transitions()
    }

    /// Whether a cached placement exists for the image attachment.
    pub fn has_cached_image(&self, attachment_id: &AttachmentId) -> bool {
        self.image_cache.contains_key(attachment_id)
    }

    fn region_is_free(&self, offset: u64, size: u64) -> bool {
        let end = offset + size;
        !self
            .active
            .iter()
            .any(|p| offset < p.region.offset + p.region.size && p.region.offset < end)
    }

    /// First-fit scan over the gaps between active placements.
    fn find_offset(&self, size: u64, alignment: u64) -> HeapResult<u64> {
        let mut cursor = 0u64;
        for placement in &self.active {
            let candidate = align_up(cursor, alignment);
            if candidate + size <= placement.region.offset {
                return Ok(candidate);
            }
            cursor = cursor.max(placement.region.offset + placement.region.size);
        }
        let candidate = align_up(cursor, alignment);
        if candidate + size > self.descriptor.budget_in_bytes {
            return Err(HeapError::OutOfMemory);
        }
        Ok(candidate)
    }

    fn place_at(&mut self, attachment_id: &AttachmentId, offset: u64, size: u64) -> PlacedAttachment {
        let region = Region { offset, size };
        let index = self
            .active
            .partition_point(|p| p.region.offset < offset);
        self.active.insert(
            index,
            Placement {
                id: attachment_id.clone(),
                region,
            },
        );
        self.watermark_in_bytes = self.watermark_in_bytes.max(offset + size);
        self.allocation_count += 1;
        self.barriers.on_activate(attachment_id, offset, size);
        PlacedAttachment {
            heap_offset: offset,
            byte_count: size,
        }
    }

    fn place(&mut self, attachment_id: &AttachmentId, size: u64, alignment: u64)
        -> HeapResult<PlacedAttachment> {
        if size == 0 {
            return Err(HeapError::InvalidArgument("zero-sized resource"));
        }
        let offset = self.find_offset(size, alignment.max(1))?;
        Ok(self.place_at(attachment_id, offset, size))
    }

    fn remove_active(&mut self, attachment_id: &AttachmentId) -> Option<Region> {
        let index = self.active.iter().position(|p| &p.id == attachment_id)?;
        let placement = self.active.remove(index);
        self.barriers
            .on_deactivate(attachment_id, placement.region.offset, placement.region.size);
        Some(placement.region)
    }
}

impl AliasedHeap for DummyAliasedHeap {
    fn init(device: &Arc<dyn Device>, descriptor: AliasedHeapDescriptor) -> HeapResult<Self> {
        if descriptor.budget_in_bytes == 0 {
            return Err(HeapError::InvalidArgument("heap budget must be non-zero"));
        }
        Ok(Self {
            device: Arc::clone(device),
            descriptor,
            active: Vec::new(),
            image_cache: HashMap::new(),
            barriers: AliasingBarrierTracker::new(),
            watermark_in_bytes: 0,
            allocation_count: 0,
        })
    }

    fn begin(&mut self, _flags: CompileFlags) {
        self.active.clear();
        self.barriers.reset();
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
        self.place(
            &descriptor.attachment_id,
            requirements.size_in_bytes,
            requirements.alignment_in_bytes,
        )
    }

    fn activate_image(
        &mut self,
        descriptor: &TransientImageDescriptor,
        _scope: &ScopeId,
    ) -> HeapResult<PlacedAttachment> {
        let requirements = self.device.image_memory_requirements(&descriptor.image);
        let size = requirements.size_in_bytes;

        // Prefer the cached placement from an earlier activation if the
        // region is currently free; the backend would reuse the cached
        // resource object there.
        if let Some(&region) = self.image_cache.get(&descriptor.attachment_id) {
            if region.size >= size
                && self.region_is_free(region.offset, size)
                && region.offset + size <= self.descriptor.budget_in_bytes
            {
                return Ok(self.place_at(&descriptor.attachment_id, region.offset, size));
            }
        }

        self.place(
            &descriptor.attachment_id,
            size,
            requirements.alignment_in_bytes,
        )
    }

    fn deactivate_buffer(&mut self, attachment_id: &AttachmentId, _scope: &ScopeId) {
        if self.remove_active(attachment_id).is_none() {
            log::debug!("deactivate_buffer: '{}' not active in this heap", attachment_id);
        }
    }

    fn deactivate_image(&mut self, attachment_id: &AttachmentId, _scope: &ScopeId) {
        match self.remove_active(attachment_id) {
            Some(region) => {
                self.image_cache.insert(attachment_id.clone(), region);
            }
            None => {
                log::debug!("deactivate_image: '{}' not active in this heap", attachment_id);
            }
        }
    }

    fn remove_from_cache(&mut self, attachment_id: &AttachmentId) {
        self.image_cache.remove(attachment_id);
    }

    fn statistics(&self) -> HeapStatistics {
        HeapStatistics {
            name: self.descriptor.name.clone(),
            heap_size_in_bytes: self.descriptor.budget_in_bytes,
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
    use crate::heap::traits::ImageFormat;
    use crate::util::size::mb;

    fn heap(budget: u64) -> DummyAliasedHeap {
        let device: Arc<dyn Device> = Arc::new(DummyDevice::default());
        let descriptor = AliasedHeapDescriptor {
            name: String::from("test heap"),
            budget_in_bytes: budget,
            alignment_in_bytes: 256,
        };
        DummyAliasedHeap::init(&device, descriptor).unwrap()
    }

    fn buffer(name: &str, bytes: u64) -> TransientBufferDescriptor {
        TransientBufferDescriptor {
            attachment_id: AttachmentId::from(name),
            buffer: BufferDescriptor { byte_count: bytes },
        }
    }

    fn image(name: &str, width: u32, height: u32) -> TransientImageDescriptor {
        TransientImageDescriptor {
            attachment_id: AttachmentId::from(name),
            image: ImageDescriptor::new_2d(width, height, ImageFormat::R8Unorm),
        }
    }

    #[test]
    fn test_first_fit_reuses_freed_gap() {
        let mut heap = heap(mb(1));
        let scope = ScopeId::from("pass");
        heap.begin(CompileFlags::NONE);

        let a = heap.activate_buffer(&buffer("a", 256 * 1024), &scope).unwrap();
        let b = heap.activate_buffer(&buffer("b", 256 * 1024), &scope).unwrap();
        assert_eq!(a.heap_offset, 0);
        assert_eq!(b.heap_offset, 256 * 1024);

        heap.deactivate_buffer(&AttachmentId::from("a"), &scope);
        let c = heap.activate_buffer(&buffer("c", 128 * 1024), &scope).unwrap();
        assert_eq!(c.heap_offset, 0);
    }

    #[test]
    fn test_out_of_memory_when_full() {
        let mut heap = heap(mb(1));
        let scope = ScopeId::from("pass");
        heap.begin(CompileFlags::NONE);

        heap.activate_buffer(&buffer("a", mb(1)), &scope).unwrap();
        let err = heap.activate_buffer(&buffer("b", 1024), &scope).unwrap_err();
        assert_eq!(err, HeapError::OutOfMemory);
    }

    #[test]
    fn test_aliasing_transition_on_reuse() {
        let mut heap = heap(mb(1));
        let scope = ScopeId::from("pass");
        heap.begin(CompileFlags::NONE);

        heap.activate_buffer(&buffer("a", 512 * 1024), &scope).unwrap();
        heap.deactivate_buffer(&AttachmentId::from("a"), &scope);
        heap.activate_buffer(&buffer("b", 512 * 1024), &scope).unwrap();

        let transitions = heap.aliasing_transitions();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].before, AttachmentId::from("a"));
        assert_eq!(transitions[0].after, AttachmentId::from("b"));
    }

    #[test]
    fn test_image_cache_reuse_and_eviction() {
        let mut heap = heap(mb(4));
        let scope = ScopeId::from("pass");
        heap.begin(CompileFlags::NONE);

        let first = heap.activate_image(&image("gbuffer0", 1024, 512), &scope).unwrap();
        heap.deactivate_image(&AttachmentId::from("gbuffer0"), &scope);
        assert!(heap.has_cached_image(&AttachmentId::from("gbuffer0")));

        // Reactivation lands on the cached offset.
        let second = heap.activate_image(&image("gbuffer0", 1024, 512), &scope).unwrap();
        assert_eq!(first.heap_offset, second.heap_offset);

        heap.deactivate_image(&AttachmentId::from("gbuffer0"), &scope);
        heap.remove_from_cache(&AttachmentId::from("gbuffer0"));
        assert!(!heap.has_cached_image(&AttachmentId::from("gbuffer0")));
    }

    #[test]
    fn test_watermark_tracks_peak_extent() {
        let mut heap = heap(mb(1));
        let scope = ScopeId::from("pass");
        heap.begin(CompileFlags::NONE);

        heap.activate_buffer(&buffer("a", 256 * 1024), &scope).unwrap();
        heap.activate_buffer(&buffer("b", 256 * 1024), &scope).unwrap();
        heap.deactivate_buffer(&AttachmentId::from("a"), &scope);
        heap.deactivate_buffer(&AttachmentId::from("b"), &scope);

        assert_eq!(heap.statistics().watermark_in_bytes, 512 * 1024);
        assert_eq!(heap.statistics().allocation_count, 2);

        heap.begin(CompileFlags::NONE);
        assert_eq!(heap.statistics().watermark_in_bytes, 0);
    }
}
