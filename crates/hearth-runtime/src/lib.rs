//! Hearth Runtime - per-run execution context for dynamically declared scripts
//!
//! This library provides the runtime core a compiled program executes against:
//! - Function, type and constant registries a program may extend at any time
//! - Exactly-once script inclusion with include-path resolution
//! - Autoload of unknown types through a host hook
//! - Ordered teardown of per-run resources

/// Hearth runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod application;
pub mod context;
pub mod descriptor;
pub mod diagnostic;
pub mod host;
pub mod inclusion;
pub mod options;
pub mod registry;
pub mod value;

// Re-export commonly used types
pub use application::{Application, ApplicationBuilder, ScriptManifest};
pub use context::{
    AutoloadHook, Disposable, DisposableId, IncludeRequest, LifecycleState, RunContext,
    RunContextBuilder, Scope,
};
pub use descriptor::{
    CompiledUnit, ConstantEntry, DescriptorTag, FunctionDescriptor, MainFn, RoutineFn,
    ScriptIndex, TypeDescriptor,
};
pub use diagnostic::{
    error_codes, sort_diagnostics, Diagnostic, DiagnosticLevel, DiagnosticSink,
    MemoryDiagnosticSink, NullDiagnosticSink, DIAG_VERSION,
};
pub use host::{BufferedHost, FsStreamLayer, HostHooks, StreamLayer};
pub use inclusion::{normalize_path, InclusionResolver, SchemeHandler};
pub use options::RuntimeOptions;
pub use value::{DeclarationKind, Locals, RuntimeError, Value, ValueArray};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        assert_eq!(VERSION, "0.1.0");
    }
}
