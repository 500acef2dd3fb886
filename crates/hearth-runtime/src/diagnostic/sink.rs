//! Diagnostic sinks
//!
//! A run reports recoverable diagnostics to a [`DiagnosticSink`]. Hosts that
//! render them (error pages, CLI output) supply their own implementation.

use super::Diagnostic;
use std::sync::{Arc, Mutex};

/// Receiver for diagnostics reported during a run
pub trait DiagnosticSink: Send + Sync {
    /// Report a diagnostic
    fn report(&self, diagnostic: Diagnostic);

    /// Get all reported diagnostics (for testing)
    fn entries(&self) -> Vec<Diagnostic>;

    /// Clear all reported diagnostics (for testing)
    fn clear(&self);
}

/// In-memory sink (default implementation)
#[derive(Debug, Clone, Default)]
pub struct MemoryDiagnosticSink {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl MemoryDiagnosticSink {
    /// Create a new in-memory sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for MemoryDiagnosticSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }

    fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

/// Null sink (discards everything)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnosticSink;

impl NullDiagnosticSink {
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticSink for NullDiagnosticSink {
    fn report(&self, _diagnostic: Diagnostic) {}

    fn entries(&self) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn clear(&self) {}
}
