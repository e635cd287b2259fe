//! Heap page bookkeeping.

/// Stable identity of a heap page, independent of its position in the page
/// list (pages can be removed by compaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PageId(pub(crate) u64);

/// One platform heap plus its compaction counter.
///
/// `collect_iteration` counts consecutive end-of-cycle evaluations in which
/// the page stayed above the waste threshold; it resets to zero the moment
/// the page is well used again.
pub(crate) struct HeapPage<H> {
    pub id: PageId,
    pub heap: H,
    pub collect_iteration: u32,
}

impl<H> HeapPage<H> {
    pub fn new(id: PageId, heap: H) -> Self {
        Self {
            id,
            heap,
            collect_iteration: 0,
        }
    }
}
