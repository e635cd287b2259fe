//! Diagnostic kinds and core types.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - something is definitely wrong.
    Error,
    /// A warning - something is probably wrong or suboptimal.
    Warning,
    /// Additional context about another diagnostic.
    Note,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `AA0xx` - allocator protocol / capacity issues
/// - `AA1xx` - budget issues
/// - `AA9xx` - internal errors
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "AA003").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// Predefined diagnostics (AA0xx - allocator protocol / capacity)
// =============================================================================

/// AA001: Attachment activated outside an open compile cycle.
pub const AA001: Diagnostic = Diagnostic::error(
    "AA001",
    "transient attachment activated outside an open compile cycle"
).with_note("activations are only valid between begin() and end()")
 .with_help("call begin() before activating transient attachments");

/// AA002: Deactivated an attachment with no recorded owner.
pub const AA002: Diagnostic = Diagnostic::error(
    "AA002",
    "deactivated a transient attachment with no recorded owner"
).with_note("the attachment was never activated, or was already deactivated")
 .with_help("check that the frame graph emits matched activate/deactivate pairs");

/// AA003: Fixed-strategy heap exhausted.
pub const AA003: Diagnostic = Diagnostic::error(
    "AA003",
    "fixed-strategy aliased heap exhausted"
).with_note("the fixed strategy creates exactly one page at init and never grows")
 .with_help("raise the heap budget, or switch to the paging or memory-hint strategy");

/// AA004: Page size calculation reached under the fixed strategy.
pub const AA004: Diagnostic = Diagnostic::error(
    "AA004",
    "page size calculation reached under the fixed strategy"
).with_note("fixed-strategy allocators never create additional pages");

/// AA005: Heap page creation failed.
pub const AA005: Diagnostic = Diagnostic::warning(
    "AA005",
    "aliased heap page creation failed"
).with_note("the backend refused to initialize a new heap; the attachment is unavailable this cycle")
 .with_help("reduce transient attachment sizes or free device memory");

// =============================================================================
// Predefined diagnostics (AA1xx - budgets)
// =============================================================================

/// AA101: Resident transient memory exceeds the configured budget.
pub const AA101: Diagnostic = Diagnostic::warning(
    "AA101",
    "transient attachment memory exceeds the configured budget"
).with_note("the budget is advisory; the compile cycle still completed")
 .with_help("raise the budget or reduce per-frame attachment sizes");

// =============================================================================
// Predefined diagnostics (AA9xx - internal)
// =============================================================================

/// AA901: Internal allocator error.
pub const AA901: Diagnostic = Diagnostic::error(
    "AA901",
    "internal allocator error"
).with_note("this indicates a bug in aliasalloc")
 .with_help("please report this issue at the aliasalloc repository");
