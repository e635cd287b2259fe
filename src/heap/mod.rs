//! Heap backend contract and implementations.
//!
//! [`traits::AliasedHeap`] is the boundary the allocator is generic over.
//! Platform backends (a DX12/Vulkan placed-resource heap) live outside this
//! crate; [`no_alloc::NoAllocationHeap`] and [`dummy::DummyAliasedHeap`] are
//! the two implementations shipped here.

pub mod barrier;
pub mod dummy;
pub mod no_alloc;
pub mod traits;

pub(crate) mod page;
