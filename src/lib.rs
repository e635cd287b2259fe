//! # aliasalloc
//!
//! Aliasing transient-attachment memory allocation for GPU frame graphs.
//!
//! A frame graph's transient attachments (depth buffers, bloom chains,
//! shadow maps) live only for a slice of the frame, so attachments with
//! disjoint lifetimes can share physical memory. This crate provides
//! [`AliasedAttachmentAllocator`], a pool of aliased heap pages that places
//! each activation first-fit, grows by one of three strategies, and retires
//! wasteful pages only after the frames still referencing them have
//! completed.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use aliasalloc::{
//!     AliasedAttachmentAllocator, AllocatorDescriptor, AttachmentId, CompileFlags,
//!     HeapAllocationStrategy, PagingParameters, ScopeId, TransientImageDescriptor,
//! };
//! use aliasalloc::heap::dummy::{DummyAliasedHeap, DummyDevice};
//! use aliasalloc::heap::traits::{Device, ImageDescriptor, ImageFormat};
//!
//! let device: Arc<dyn Device> = Arc::new(DummyDevice::default());
//! let descriptor = AllocatorDescriptor::new("TransientAttachmentPool")
//!     .with_strategy(HeapAllocationStrategy::Paging(PagingParameters::default()));
//! let mut allocator =
//!     AliasedAttachmentAllocator::<DummyAliasedHeap>::init(device, descriptor)?;
//!
//! let scope = ScopeId::from("depth_prepass");
//! let depth = TransientImageDescriptor {
//!     attachment_id: AttachmentId::from("depth"),
//!     image: ImageDescriptor::new_2d(1920, 1080, ImageFormat::D32Float),
//! };
//!
//! allocator.begin(CompileFlags::NONE, 0);
//! let _placed = allocator.activate_image(&depth, &scope);
//! // ... record the pass ...
//! allocator.deactivate_image(&depth.attachment_id, &scope);
//! allocator.end();
//!
//! // Once per completed frame:
//! allocator.on_frame_end();
//! # Ok::<(), aliasalloc::HeapError>(())
//! ```
//!
//! ## Growth strategies
//!
//! * [`HeapAllocationStrategy::Fixed`] - one page covering the budget,
//!   created up front; exhaustion fails the activation.
//! * [`HeapAllocationStrategy::Paging`] - fixed-size pages on demand.
//! * [`HeapAllocationStrategy::MemoryHint`] - pages sized from a per-cycle
//!   usage hint, typically the watermark of a preceding measurement cycle
//!   run with [`CompileFlags::DONT_ALLOCATE_RESOURCES`].
//!
//! ## Diagnostics
//!
//! Misuse and memory pressure are reported through the [`diagnostics`]
//! module with stable `AA###` codes via the `log` crate. Set the
//! `ALIASALLOC_STRICT` environment variable (with
//! [`diagnostics::init_from_env`]) to turn diagnostics into panics during
//! development.

pub mod api;
pub mod diagnostics;
pub mod heap;

mod collector;
mod sync;
mod util;

pub use api::allocator::AliasedAttachmentAllocator;
pub use api::config::{
    AllocatorDescriptor, HeapAllocationStrategy, MemoryHintParameters, PagingParameters,
};
pub use api::stats::HeapMemoryUsage;
pub use heap::traits::{
    AliasedHeap, AliasedHeapDescriptor, AttachmentId, BufferDescriptor, CompileFlags, Device,
    HeapError, HeapResult, HeapStatistics, ImageDescriptor, ImageFormat, PlacedAttachment,
    ResourceMemoryRequirements, ScopeId, TransientBufferDescriptor, TransientImageDescriptor,
};
