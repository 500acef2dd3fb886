//! Shared test utilities
//!
//! Helpers for building applications with instrumented scripts and run
//! contexts wired to in-memory collaborators.

#![allow(dead_code)]

use hearth_runtime::{
    Application, ApplicationBuilder, BufferedHost, MemoryDiagnosticSink, RunContext,
    RuntimeError, RuntimeOptions, Scope, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Re-export testing utilities
pub use pretty_assertions::{assert_eq, assert_ne};

/// Root every test application is registered under
pub const ROOT: &str = "/srv/app";

/// Counts how many times the scripts built from it executed
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Script entry point that bumps the counter and returns `result`
    pub fn script(
        &self,
        result: Value,
    ) -> impl Fn(&mut RunContext, &mut Scope<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static
    {
        let counter = self.0.clone();
        move |_ctx: &mut RunContext, _scope: &mut Scope<'_>| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(result.clone())
        }
    }
}

/// Application with one counted script per path
pub fn app_with_scripts(paths: &[&str], counter: &Counter) -> Arc<Application> {
    let mut builder = ApplicationBuilder::new();
    for path in paths {
        builder = builder
            .declare_script(path, counter.script(Value::Int(1)))
            .unwrap();
    }
    builder.build()
}

/// Run context rooted at [`ROOT`], reporting into `sink` and writing to `host`
pub fn context(app: Arc<Application>, sink: &MemoryDiagnosticSink, host: &BufferedHost) -> RunContext {
    RunContext::builder(app)
        .options(RuntimeOptions::with_root(ROOT))
        .diagnostics(sink.clone())
        .host(host.clone())
        .build()
}
