//! Internal helpers.

pub(crate) mod size;
