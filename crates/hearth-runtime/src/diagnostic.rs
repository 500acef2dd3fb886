//! Diagnostic system for runtime errors and warnings
//!
//! Recoverable problems (a missing `include`, a constant redefinition, a
//! swallowed teardown failure) are reported as [`Diagnostic`]s to the run's
//! [`DiagnosticSink`]. Fatal problems are [`RuntimeError`](crate::RuntimeError)s
//! and may additionally be reported before they propagate.

pub mod error_codes;
pub mod sink;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use sink::{DiagnosticSink, MemoryDiagnosticSink, NullDiagnosticSink};

/// Diagnostic schema version
pub const DIAG_VERSION: u32 = 1;

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// Problem that aborts the run
    Error,
    /// Problem the run continues past
    Warning,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Error => write!(f, "error"),
            DiagnosticLevel::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message (error or warning)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Diagnostic schema version
    pub diag_version: u32,
    /// Severity level
    pub level: DiagnosticLevel,
    /// Error code (e.g., "HR0010")
    pub code: String,
    /// Main diagnostic message
    pub message: String,
    /// Script or file the diagnostic is about
    pub file: String,
    /// Additional notes (optional)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
    /// Suggested fix (optional)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub help: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic with code
    pub fn error_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, code.into(), message.into())
    }

    /// Create a new warning diagnostic with code
    pub fn warning_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, code.into(), message.into())
    }

    /// Create a new error diagnostic (uses generic error code)
    pub fn error(message: impl Into<String>) -> Self {
        Self::error_with_code(error_codes::GENERIC_ERROR, message)
    }

    /// Create a new warning diagnostic (uses generic warning code)
    pub fn warning(message: impl Into<String>) -> Self {
        Self::warning_with_code(error_codes::GENERIC_WARNING, message)
    }

    fn new(level: DiagnosticLevel, code: String, message: String) -> Self {
        Self {
            diag_version: DIAG_VERSION,
            level,
            code,
            message,
            file: "<run>".to_string(),
            notes: Vec::new(),
            help: None,
        }
    }

    /// Set the file path
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Add a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Add a help message
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }

    /// Format as human-readable string
    pub fn to_human_string(&self) -> String {
        let mut output = String::new();

        // Header: warning[HW0002]: Failed opening 'x.ext' for inclusion
        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level, self.code, self.message
        ));
        output.push_str(&format!("  --> {}\n", self.file));

        for note in &self.notes {
            output.push_str(&format!("   = note: {}\n", note));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!("   = help: {}\n", help));
        }

        output
    }

    /// Format as JSON string
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Format as compact JSON string
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.level, self.code, self.message)
    }
}

/// Sort diagnostics by level (errors first), then by file
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| match (a.level, b.level) {
        (DiagnosticLevel::Error, DiagnosticLevel::Warning) => std::cmp::Ordering::Less,
        (DiagnosticLevel::Warning, DiagnosticLevel::Error) => std::cmp::Ordering::Greater,
        _ => a.file.cmp(&b.file),
    });
}
