//! Diagnostic emission backend.
//!
//! Handles outputting diagnostics to the log crate, stderr, or custom sinks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::sync::mutex::Mutex;

use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::{should_panic, should_panic_on_warning};

/// Global flag to suppress diagnostic output (for testing and benches).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Registered sinks, keyed by their id.
static SINKS: Mutex<Vec<(u64, Arc<dyn DiagnosticSink>)>> = Mutex::new(Vec::new());

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Suppress all diagnostic output.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Emit a diagnostic.
pub fn emit(diag: &Diagnostic) {
    emit_inner(diag, None);
}

/// Emit a diagnostic with additional runtime context.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    emit_inner(diag, Some(context));
}

fn emit_inner(diag: &Diagnostic, context: Option<&str>) {
    if is_suppressed() {
        return;
    }

    match diag.kind {
        DiagnosticKind::Error => match context {
            Some(ctx) => log::error!("[{}] {}: {}", diag.code, diag.message, ctx),
            None => log::error!("[{}] {}", diag.code, diag.message),
        },
        DiagnosticKind::Warning => match context {
            Some(ctx) => log::warn!("[{}] {}: {}", diag.code, diag.message, ctx),
            None => log::warn!("[{}] {}", diag.code, diag.message),
        },
        DiagnosticKind::Note => match context {
            Some(ctx) => log::info!("[{}] {}: {}", diag.code, diag.message, ctx),
            None => log::info!("[{}] {}", diag.code, diag.message),
        },
    }

    // Only emit to stderr in debug builds, unless the diagnostics feature is on
    #[cfg(any(debug_assertions, feature = "diagnostics"))]
    {
        emit_to_stderr(diag, context);
    }

    for (_, sink) in SINKS.lock().iter() {
        sink.emit(diag, context);
    }

    let panic_now = match diag.kind {
        DiagnosticKind::Error => should_panic(),
        DiagnosticKind::Warning => should_panic_on_warning(),
        DiagnosticKind::Note => false,
    };
    if panic_now {
        match context {
            Some(ctx) => panic!(
                "[aliasalloc][{}] {}\nContext: {}\nStrict mode enabled - diagnostics are fatal.",
                diag.code, diag.message, ctx
            ),
            None => panic!(
                "[aliasalloc][{}] {}\nStrict mode enabled - diagnostics are fatal.",
                diag.code, diag.message
            ),
        }
    }
}

/// Internal: emit to stderr.
#[cfg(any(debug_assertions, feature = "diagnostics"))]
fn emit_to_stderr(diag: &Diagnostic, context: Option<&str>) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(
        stderr,
        "[aliasalloc][{}] {}: {}",
        diag.code,
        diag.kind.prefix(),
        diag.message
    );

    if let Some(ctx) = context {
        let _ = writeln!(stderr, "  context: {}", ctx);
    }

    if let Some(note) = diag.note {
        let _ = writeln!(stderr, "  note: {}", note);
    }

    if let Some(help) = diag.help {
        let _ = writeln!(stderr, "  help: {}", help);
    }

    let _ = writeln!(stderr);
}

/// A diagnostic sink trait for custom output.
pub trait DiagnosticSink: Send + Sync {
    /// Handle a diagnostic.
    fn emit(&self, diag: &Diagnostic, context: Option<&str>);
}

/// Handle for a registered sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkId(u64);

/// Register a sink. Multiple sinks may be registered at once.
pub fn add_sink(sink: Arc<dyn DiagnosticSink>) -> SinkId {
    let id = NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed);
    SINKS.lock().push((id, sink));
    SinkId(id)
}

/// Remove a previously registered sink.
pub fn remove_sink(id: SinkId) {
    SINKS.lock().retain(|(sink_id, _)| *sink_id != id.0);
}

/// A diagnostic captured by a [`CollectingSink`].
#[derive(Debug, Clone)]
pub struct CollectedDiagnostic {
    /// Diagnostic code (e.g., "AA002").
    pub code: &'static str,
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Primary message.
    pub message: &'static str,
    /// Runtime context, if any was supplied.
    pub context: Option<String>,
}

/// A simple sink that collects diagnostics.
#[derive(Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<CollectedDiagnostic>>,
}

impl CollectingSink {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Get all collected diagnostics.
    pub fn entries(&self) -> Vec<CollectedDiagnostic> {
        self.entries.lock().clone()
    }

    /// Clear collected diagnostics.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Count entries with the given code.
    pub fn count_code(&self, code: &str) -> usize {
        self.entries.lock().iter().filter(|e| e.code == code).count()
    }

    /// Count entries with the given code whose context contains `needle`.
    pub fn count_code_with_context(&self, code: &str, needle: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| {
                e.code == code
                    && e.context
                        .as_deref()
                        .map(|c| c.contains(needle))
                        .unwrap_or(false)
            })
            .count()
    }

    /// Check if any errors were collected.
    pub fn has_errors(&self) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.kind == DiagnosticKind::Error)
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diag: &Diagnostic, context: Option<&str>) {
        self.entries.lock().push(CollectedDiagnostic {
            code: diag.code,
            kind: diag.kind,
            message: diag.message,
            context: context.map(str::to_owned),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::kind::AA002;

    // Suppression toggles process-global state, so it shares one test with
    // the sink assertions rather than racing them from a parallel test.
    #[test]
    fn test_sinks_and_suppression() {
        let sink = Arc::new(CollectingSink::new());
        let id = add_sink(sink.clone());

        emit_with_context(&AA002, "attachment 'sink_probe'");

        assert_eq!(sink.count_code_with_context("AA002", "sink_probe"), 1);
        assert!(sink.has_errors());

        suppress_diagnostics(true);
        assert!(is_suppressed());
        emit_with_context(&AA002, "attachment 'suppression_probe'");
        suppress_diagnostics(false);
        assert!(!is_suppressed());
        assert_eq!(sink.count_code_with_context("AA002", "suppression_probe"), 0);

        sink.clear();
        assert_eq!(sink.count_code_with_context("AA002", "sink_probe"), 0);

        remove_sink(id);
        emit_with_context(&AA002, "attachment 'sink_probe'");
        assert_eq!(sink.count_code_with_context("AA002", "sink_probe"), 0);
    }
}
