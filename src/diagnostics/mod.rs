//! Diagnostics for allocator misuse and memory pressure.
//!
//! Every failure the allocator can report carries a stable `AA###` code so
//! integrations can match on it. Emission goes to the `log` crate, to stderr
//! in debug builds (or with the `diagnostics` feature), and to any
//! registered [`DiagnosticSink`].

mod emit;
mod kind;
mod strict;

pub use emit::{
    add_sink, emit, emit_with_context, is_suppressed, remove_sink, suppress_diagnostics,
    CollectedDiagnostic, CollectingSink, DiagnosticSink, SinkId,
};
pub use kind::{Diagnostic, DiagnosticKind};
pub use kind::{AA001, AA002, AA003, AA004, AA005, AA101, AA901};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};
