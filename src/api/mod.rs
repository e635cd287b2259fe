//! Public allocator API: configuration, the allocator itself, and pool
//! memory accounting.

pub mod allocator;
pub mod config;
pub mod stats;

pub use allocator::AliasedAttachmentAllocator;
pub use config::{
    AllocatorDescriptor, HeapAllocationStrategy, MemoryHintParameters, PagingParameters,
};
pub use stats::HeapMemoryUsage;
