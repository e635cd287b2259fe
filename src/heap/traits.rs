//! Aliased heap traits and boundary types.
//!
//! This module defines the heap backend interface WITHOUT pulling in any
//! platform-specific dependencies. The allocator is generic over
//! [`AliasedHeap`], so backend dispatch is resolved at compile time.

use std::fmt;
use std::sync::Arc;

/// Errors that can occur at the heap boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// The heap page has no room for the resource.
    OutOfMemory,
    /// A descriptor or parameter was rejected.
    InvalidArgument(&'static str),
    /// Backend-specific error (opaque).
    Backend(String),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::OutOfMemory => write!(f, "heap out of memory"),
            HeapError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            HeapError::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

impl std::error::Error for HeapError {}

/// Result alias for heap-boundary operations.
pub type HeapResult<T> = Result<T, HeapError>;

/// Identifier of a logical transient attachment.
///
/// Cheap to clone; equality and hashing are by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentId(Arc<str>);

impl AttachmentId {
    /// Create an attachment id from a name.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Get the attachment name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AttachmentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the frame-graph scope (pass) using an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(Arc<str>);

impl ScopeId {
    /// Create a scope id from a name.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Get the scope name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScopeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Description of a transient buffer resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Requested size in bytes.
    pub byte_count: u64,
}

/// Pixel format of a transient image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    R8Unorm,
    R8G8B8A8Unorm,
    R16G16B16A16Float,
    R32Float,
    D32Float,
}

impl ImageFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> u64 {
        match self {
            ImageFormat::R8Unorm => 1,
            ImageFormat::R8G8B8A8Unorm => 4,
            ImageFormat::R16G16B16A16Float => 8,
            ImageFormat::R32Float => 4,
            ImageFormat::D32Float => 4,
        }
    }
}

/// Description of a transient image resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u16,
    pub sample_count: u8,
    pub format: ImageFormat,
}

impl ImageDescriptor {
    /// Create a single-mip, single-sample 2D image descriptor.
    pub fn new_2d(width: u32, height: u32, format: ImageFormat) -> Self {
        Self {
            width,
            height,
            depth: 1,
            mip_levels: 1,
            sample_count: 1,
            format,
        }
    }
}

/// A transient buffer attachment request.
#[derive(Debug, Clone)]
pub struct TransientBufferDescriptor {
    /// Logical attachment identifier.
    pub attachment_id: AttachmentId,
    /// Buffer shape.
    pub buffer: BufferDescriptor,
}

/// A transient image attachment request.
#[derive(Debug, Clone)]
pub struct TransientImageDescriptor {
    /// Logical attachment identifier.
    pub attachment_id: AttachmentId,
    /// Image shape.
    pub image: ImageDescriptor,
}

/// Size and alignment a device requires for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceMemoryRequirements {
    pub size_in_bytes: u64,
    pub alignment_in_bytes: u64,
}

/// A resource placed into a heap page.
///
/// `None` from the allocator's activate calls is the failure signal; callers
/// must treat the attachment as unavailable for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedAttachment {
    /// Byte offset of the resource within its heap page.
    pub heap_offset: u64,
    /// Placed size in bytes (aligned).
    pub byte_count: u64,
}

/// Flags for one compile cycle.
///
/// `DONT_ALLOCATE_RESOURCES` runs a measurement pass: activations are
/// tracked for sizing but no driver memory is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileFlags {
    bits: u32,
}

impl CompileFlags {
    pub const NONE: Self = Self { bits: 0 };
    pub const DONT_ALLOCATE_RESOURCES: Self = Self { bits: 0x0001 };

    /// Check whether all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }
}

impl std::ops::BitOr for CompileFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            bits: self.bits | rhs.bits,
        }
    }
}

/// Configuration handed to a heap page at creation.
#[derive(Debug, Clone)]
pub struct AliasedHeapDescriptor {
    /// Display name, used in statistics and diagnostics.
    pub name: String,
    /// Page capacity in bytes.
    pub budget_in_bytes: u64,
    /// Alignment for placements inside the page.
    pub alignment_in_bytes: u64,
}

impl Default for AliasedHeapDescriptor {
    fn default() -> Self {
        Self {
            name: String::from("AliasedHeap"),
            budget_in_bytes: 0,
            alignment_in_bytes: 1,
        }
    }
}

/// Per-heap statistics for one compile cycle.
#[derive(Debug, Clone, Default)]
pub struct HeapStatistics {
    /// Heap name.
    pub name: String,
    /// Heap capacity in bytes. For the measurement heap this reports the
    /// high-water mark, i.e. the extra bytes a real pass would need.
    pub heap_size_in_bytes: u64,
    /// Peak simultaneous occupancy reached during the cycle.
    pub watermark_in_bytes: u64,
    /// Activations performed during the cycle.
    pub allocation_count: u64,
}

impl HeapStatistics {
    /// Fraction of the heap that stayed unused this cycle.
    pub fn wasted_percentage(&self) -> f32 {
        if self.heap_size_in_bytes == 0 {
            return 0.0;
        }
        let wasted = self
            .heap_size_in_bytes
            .saturating_sub(self.watermark_in_bytes);
        wasted as f32 / self.heap_size_in_bytes as f32
    }
}

/// The backend device, opaque to the allocator beyond sizing queries.
pub trait Device: Send + Sync {
    /// Memory requirements for a buffer with the given descriptor.
    fn buffer_memory_requirements(&self, descriptor: &BufferDescriptor)
        -> ResourceMemoryRequirements;

    /// Memory requirements for an image with the given descriptor.
    fn image_memory_requirements(&self, descriptor: &ImageDescriptor)
        -> ResourceMemoryRequirements;

    /// Maximum number of frames in flight on this device.
    fn frame_count_max(&self) -> u32;
}

/// A heap that can activate and deactivate aliased transient resources.
///
/// Implementations own placement within their budget (first-fit, best-fit,
/// caching - their choice) and the aliasing barrier bookkeeping that goes
/// with it. The allocator only observes success or failure.
pub trait AliasedHeap: Sized {
    /// Create a heap page with the given descriptor.
    fn init(device: &Arc<dyn Device>, descriptor: AliasedHeapDescriptor) -> HeapResult<Self>;

    /// Start a compile cycle.
    fn begin(&mut self, flags: CompileFlags);

    /// Finish the compile cycle. Cycle statistics stay readable until the
    /// next `begin`.
    fn end(&mut self);

    /// Place a transient buffer for the requesting scope.
    fn activate_buffer(
        &mut self,
        descriptor: &TransientBufferDescriptor,
        scope: &ScopeId,
    ) -> HeapResult<PlacedAttachment>;

    /// Place a transient image for the requesting scope.
    fn activate_image(
        &mut self,
        descriptor: &TransientImageDescriptor,
        scope: &ScopeId,
    ) -> HeapResult<PlacedAttachment>;

    /// Release a buffer after its last use.
    fn deactivate_buffer(&mut self, attachment_id: &AttachmentId, scope: &ScopeId);

    /// Release an image after its last use.
    fn deactivate_image(&mut self, attachment_id: &AttachmentId, scope: &ScopeId);

    /// Drop any speculative cached placement for the attachment.
    fn remove_from_cache(&mut self, attachment_id: &AttachmentId);

    /// Statistics for the current (or just ended) cycle.
    fn statistics(&self) -> HeapStatistics;

    /// The descriptor the heap was created with.
    fn descriptor(&self) -> &AliasedHeapDescriptor;

    /// Rename the heap (statistics and diagnostics pick the name up).
    fn set_name(&mut self, name: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_flags() {
        let flags = CompileFlags::NONE;
        assert!(!flags.contains(CompileFlags::DONT_ALLOCATE_RESOURCES));

        let flags = CompileFlags::NONE | CompileFlags::DONT_ALLOCATE_RESOURCES;
        assert!(flags.contains(CompileFlags::DONT_ALLOCATE_RESOURCES));
    }

    #[test]
    fn test_wasted_percentage() {
        let stats = HeapStatistics {
            name: String::from("test"),
            heap_size_in_bytes: 1000,
            watermark_in_bytes: 250,
            allocation_count: 1,
        };
        assert!((stats.wasted_percentage() - 0.75).abs() < f32::EPSILON);

        let empty = HeapStatistics::default();
        assert_eq!(empty.wasted_percentage(), 0.0);
    }

    #[test]
    fn test_attachment_id_equality() {
        let a = AttachmentId::from("depth_prepass");
        let b = AttachmentId::new("depth_prepass");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "depth_prepass");
    }
}
