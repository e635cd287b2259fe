//! Aliasing barrier tracking.
//!
//! When two logical resources share one physical region because their
//! lifetimes do not overlap, the GPU needs an aliasing barrier between the
//! last use of the old resource and the first use of the new one. The
//! tracker records which retired resource a new placement overlaps so the
//! backend can emit those transitions.

use crate::heap::traits::AttachmentId;

/// A required aliasing transition between two resources sharing memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasingTransition {
    /// Resource that previously occupied the region.
    pub before: AttachmentId,
    /// Resource taking the region over.
    pub after: AttachmentId,
    /// Start of the overlapping range within the heap page.
    pub offset_in_bytes: u64,
    /// Length of the overlapping range.
    pub size_in_bytes: u64,
}

struct RetiredRegion {
    id: AttachmentId,
    offset: u64,
    size: u64,
}

/// Tracks retired placements within one heap page and derives the aliasing
/// transitions new placements require. Reset once per compile cycle.
#[derive(Default)]
pub struct AliasingBarrierTracker {
    retired: Vec<RetiredRegion>,
    transitions: Vec<AliasingTransition>,
}

impl AliasingBarrierTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            retired: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Forget all retired regions and recorded transitions.
    pub fn reset(&mut self) {
        self.retired.clear();
        self.transitions.clear();
    }

    /// Record that a resource released its region.
    pub fn on_deactivate(&mut self, attachment_id: &AttachmentId, offset: u64, size: u64) {
        self.retired.push(RetiredRegion {
            id: attachment_id.clone(),
            offset,
            size,
        });
    }

    /// Record a new placement; any overlap with a retired region becomes an
    /// aliasing transition. A partially overlapped retired region is
    /// consumed whole - one transition per old/new resource pair is enough
    /// for the backend to order the uses.
    pub fn on_activate(&mut self, attachment_id: &AttachmentId, offset: u64, size: u64) {
        let end = offset + size;
        let transitions = &mut self.transitions;
        self.retired.retain(|region| {
            let region_end = region.offset + region.size;
            let overlap_start = offset.max(region.offset);
            let overlap_end = end.min(region_end);
            if overlap_start < overlap_end {
                transitions.push(AliasingTransition {
                    before: region.id.clone(),
                    after: attachment_id.clone(),
                    offset_in_bytes: overlap_start,
                    size_in_bytes: overlap_end - overlap_start,
                });
                false
            } else {
                true
            }
        });
    }

    /// Transitions recorded since the last reset.
    pub fn transitions(&self) -> &[AliasingTransition] {
        &self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_records_transition() {
        let mut tracker = AliasingBarrierTracker::new();
        let a = AttachmentId::from("shadow_map");
        let b = AttachmentId::from("bloom_target");

        tracker.on_deactivate(&a, 0, 1024);
        tracker.on_activate(&b, 512, 1024);

        let transitions = tracker.transitions();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].before, a);
        assert_eq!(transitions[0].after, b);
        assert_eq!(transitions[0].offset_in_bytes, 512);
        assert_eq!(transitions[0].size_in_bytes, 512);
    }

    #[test]
    fn test_disjoint_regions_do_not_transition() {
        let mut tracker = AliasingBarrierTracker::new();
        tracker.on_deactivate(&AttachmentId::from("a"), 0, 256);
        tracker.on_activate(&AttachmentId::from("b"), 256, 256);
        assert!(tracker.transitions().is_empty());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut tracker = AliasingBarrierTracker::new();
        tracker.on_deactivate(&AttachmentId::from("a"), 0, 256);
        tracker.reset();
        tracker.on_activate(&AttachmentId::from("b"), 0, 256);
        assert!(tracker.transitions().is_empty());
    }
}
