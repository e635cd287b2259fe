//! Allocator configuration.
//!
//! An [`AllocatorDescriptor`] picks one of three growth strategies:
//!
//! * `Fixed` - a single page sized to the budget at init; never grows.
//! * `Paging` - grows by fixed-size pages on demand, reclaims idle ones.
//! * `MemoryHint` - sizes new pages from a per-cycle usage hint, which the
//!   caller typically obtains from a measurement cycle.

use crate::heap::traits::{HeapError, HeapResult};
use crate::util::size::{kb, mb};

/// Parameters for the paging strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct PagingParameters {
    /// Size of each page added on demand.
    pub page_size_in_bytes: u64,
    /// Fraction of the budget to allocate eagerly at init.
    pub initial_allocation_percentage: f32,
    /// Waste fraction above which a page becomes a compaction candidate.
    pub max_wasted_percentage: f32,
    /// Consecutive wasteful cycles before a candidate page is retired.
    pub collect_latency: u32,
}

impl Default for PagingParameters {
    fn default() -> Self {
        Self {
            page_size_in_bytes: mb(32),
            initial_allocation_percentage: 0.5,
            max_wasted_percentage: 0.5,
            collect_latency: 2,
        }
    }
}

/// Parameters for the memory-hint strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHintParameters {
    /// Floor for the size of any page created.
    pub min_heap_size_in_bytes: u64,
    /// Growth headroom multiplied into every new page size.
    pub heap_page_scale_factor: f32,
    /// Waste fraction above which a page becomes a compaction candidate.
    pub max_wasted_percentage: f32,
    /// Consecutive wasteful cycles before a candidate page is retired.
    pub collect_latency: u32,
}

impl Default for MemoryHintParameters {
    fn default() -> Self {
        Self {
            min_heap_size_in_bytes: mb(4),
            heap_page_scale_factor: 1.25,
            max_wasted_percentage: 0.3,
            collect_latency: 3,
        }
    }
}

/// How the allocator acquires and retires heap pages.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapAllocationStrategy {
    /// One page covering the whole budget, created at init.
    Fixed,
    /// Fixed-size pages on demand.
    Paging(PagingParameters),
    /// Page sizes driven by the caller's per-cycle usage hint.
    MemoryHint(MemoryHintParameters),
}

impl HeapAllocationStrategy {
    pub fn is_fixed(&self) -> bool {
        matches!(self, HeapAllocationStrategy::Fixed)
    }

    /// Latency before a retired-candidate page is actually removed. Fixed
    /// never retires pages.
    pub fn collect_latency(&self) -> u32 {
        match self {
            HeapAllocationStrategy::Fixed => 0,
            HeapAllocationStrategy::Paging(p) => p.collect_latency,
            HeapAllocationStrategy::MemoryHint(p) => p.collect_latency,
        }
    }

    /// Waste threshold for compaction. Fixed reports 1.0 so no page ever
    /// qualifies.
    pub fn max_wasted_percentage(&self) -> f32 {
        match self {
            HeapAllocationStrategy::Fixed => 1.0,
            HeapAllocationStrategy::Paging(p) => p.max_wasted_percentage,
            HeapAllocationStrategy::MemoryHint(p) => p.max_wasted_percentage,
        }
    }

    /// Smallest page the strategy will create.
    pub fn min_heap_size_in_bytes(&self) -> u64 {
        match self {
            HeapAllocationStrategy::Fixed => 0,
            HeapAllocationStrategy::Paging(p) => p.page_size_in_bytes,
            HeapAllocationStrategy::MemoryHint(p) => p.min_heap_size_in_bytes,
        }
    }

    /// Scale factor applied to new page sizes.
    pub fn heap_page_scale_factor(&self) -> f32 {
        match self {
            HeapAllocationStrategy::MemoryHint(p) => p.heap_page_scale_factor,
            _ => 1.0,
        }
    }
}

impl Default for HeapAllocationStrategy {
    fn default() -> Self {
        HeapAllocationStrategy::Paging(PagingParameters::default())
    }
}

/// Configuration for an [`AliasedAttachmentAllocator`].
///
/// [`AliasedAttachmentAllocator`]: crate::api::allocator::AliasedAttachmentAllocator
#[derive(Debug, Clone)]
pub struct AllocatorDescriptor {
    /// Pool name, used for page naming, statistics and diagnostics.
    pub name: String,
    /// Advisory pool budget in bytes; 0 means unbounded. Exceeding it emits
    /// a diagnostic but never fails an activation.
    pub budget_in_bytes: u64,
    /// Placement alignment handed down to heap pages.
    pub alignment_in_bytes: u64,
    /// Page growth strategy.
    pub allocation_parameters: HeapAllocationStrategy,
}

impl AllocatorDescriptor {
    /// Start a descriptor with defaults and the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set the advisory budget.
    pub fn with_budget(mut self, budget_in_bytes: u64) -> Self {
        self.budget_in_bytes = budget_in_bytes;
        self
    }

    /// Set the placement alignment.
    pub fn with_alignment(mut self, alignment_in_bytes: u64) -> Self {
        self.alignment_in_bytes = alignment_in_bytes;
        self
    }

    /// Set the growth strategy.
    pub fn with_strategy(mut self, strategy: HeapAllocationStrategy) -> Self {
        self.allocation_parameters = strategy;
        self
    }

    /// Check the descriptor for internally inconsistent settings.
    pub fn validate(&self) -> HeapResult<()> {
        if self.alignment_in_bytes == 0 || !self.alignment_in_bytes.is_power_of_two() {
            return Err(HeapError::InvalidArgument(
                "alignment must be a non-zero power of two",
            ));
        }
        match &self.allocation_parameters {
            HeapAllocationStrategy::Fixed => {
                if self.budget_in_bytes == 0 {
                    return Err(HeapError::InvalidArgument(
                        "fixed strategy requires a non-zero budget",
                    ));
                }
            }
            HeapAllocationStrategy::Paging(p) => {
                if p.page_size_in_bytes == 0 {
                    return Err(HeapError::InvalidArgument("page size must be non-zero"));
                }
                if !(0.0..=1.0).contains(&p.initial_allocation_percentage) {
                    return Err(HeapError::InvalidArgument(
                        "initial allocation percentage must be within 0..=1",
                    ));
                }
                if !(0.0..=1.0).contains(&p.max_wasted_percentage) {
                    return Err(HeapError::InvalidArgument(
                        "max wasted percentage must be within 0..=1",
                    ));
                }
            }
            HeapAllocationStrategy::MemoryHint(p) => {
                if p.heap_page_scale_factor < 1.0 {
                    return Err(HeapError::InvalidArgument(
                        "heap page scale factor must be at least 1.0",
                    ));
                }
                if !(0.0..=1.0).contains(&p.max_wasted_percentage) {
                    return Err(HeapError::InvalidArgument(
                        "max wasted percentage must be within 0..=1",
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for AllocatorDescriptor {
    fn default() -> Self {
        Self {
            name: String::from("TransientAttachmentPool"),
            budget_in_bytes: 0,
            alignment_in_bytes: kb(64),
            allocation_parameters: HeapAllocationStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AllocatorDescriptor::default().validate().is_ok());
    }

    #[test]
    fn test_fixed_requires_budget() {
        let descriptor = AllocatorDescriptor::new("pool")
            .with_strategy(HeapAllocationStrategy::Fixed);
        assert!(descriptor.validate().is_err());
        assert!(descriptor.with_budget(mb(16)).validate().is_ok());
    }

    #[test]
    fn test_alignment_must_be_power_of_two() {
        let descriptor = AllocatorDescriptor::new("pool").with_alignment(3);
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_scale_factor_below_one_rejected() {
        let descriptor = AllocatorDescriptor::new("pool").with_strategy(
            HeapAllocationStrategy::MemoryHint(MemoryHintParameters {
                heap_page_scale_factor: 0.5,
                ..Default::default()
            }),
        );
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_strategy_accessors() {
        let fixed = HeapAllocationStrategy::Fixed;
        assert!(fixed.is_fixed());
        assert_eq!(fixed.collect_latency(), 0);
        assert_eq!(fixed.max_wasted_percentage(), 1.0);

        let paging = HeapAllocationStrategy::default();
        assert_eq!(paging.min_heap_size_in_bytes(), mb(32));
        assert_eq!(paging.heap_page_scale_factor(), 1.0);
    }
}
