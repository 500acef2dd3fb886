//! Process-wide application tables
//!
//! An [`Application`] is seeded once from one or more [`ScriptManifest`]s and
//! shared by every run through an `Arc`. It is never mutated after
//! [`ApplicationBuilder::build`].

use crate::context::{RunContext, Scope};
use crate::descriptor::{ConstantEntry, FunctionDescriptor, MainFn, TypeDescriptor};
use crate::inclusion::SchemeHandler;
use crate::registry::{ConstantTable, DeclareOutcome, RoutineTable, ScriptTable, TypeTable};
use crate::value::{RuntimeError, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Declarations produced by the compiler for one library or program
pub trait ScriptManifest {
    fn builtin_functions(&self) -> Vec<Arc<FunctionDescriptor>> {
        Vec::new()
    }

    fn builtin_types(&self) -> Vec<Arc<TypeDescriptor>> {
        Vec::new()
    }

    fn builtin_constants(&self) -> Vec<ConstantEntry> {
        Vec::new()
    }

    /// Compiled scripts as `(root-relative path, entry point)` pairs
    fn scripts(&self) -> Vec<(String, MainFn)> {
        Vec::new()
    }
}

/// Shared, immutable tables visible to every run
pub struct Application {
    routines: Arc<RoutineTable>,
    types: Arc<TypeTable>,
    constants: Arc<ConstantTable>,
    scripts: Arc<ScriptTable>,
    schemes: HashMap<String, Arc<dyn SchemeHandler>>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn routines(&self) -> &Arc<RoutineTable> {
        &self.routines
    }

    pub fn types(&self) -> &Arc<TypeTable> {
        &self.types
    }

    pub fn constants(&self) -> &Arc<ConstantTable> {
        &self.constants
    }

    pub fn scripts(&self) -> &Arc<ScriptTable> {
        &self.scripts
    }

    /// Handler registered for `scheme` (case-insensitive)
    pub fn scheme_handler(&self, scheme: &str) -> Option<&Arc<dyn SchemeHandler>> {
        self.schemes.get(&scheme.to_ascii_lowercase())
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemes: Vec<_> = self.schemes.keys().collect();
        schemes.sort();
        f.debug_struct("Application")
            .field("routines", &self.routines.len())
            .field("types", &self.types.len())
            .field("constants", &self.constants.len())
            .field("scripts", &self.scripts.len())
            .field("schemes", &schemes)
            .finish()
    }
}

/// Builder for [`Application`]
#[derive(Default)]
pub struct ApplicationBuilder {
    routines: RoutineTable,
    types: TypeTable,
    constants: ConstantTable,
    scripts: ScriptTable,
    schemes: HashMap<String, Arc<dyn SchemeHandler>>,
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every declaration of a manifest
    pub fn add_manifest(mut self, manifest: &dyn ScriptManifest) -> Result<Self, RuntimeError> {
        for function in manifest.builtin_functions() {
            self.routines.insert(function)?;
        }
        for ty in manifest.builtin_types() {
            self.types.insert(ty)?;
        }
        for constant in manifest.builtin_constants() {
            self = self.declare_constant(constant);
        }
        for (path, main) in manifest.scripts() {
            self.scripts.declare(&path, main)?;
        }
        Ok(self)
    }

    pub fn declare_function(mut self, function: Arc<FunctionDescriptor>) -> Result<Self, RuntimeError> {
        self.routines.insert(function)?;
        Ok(self)
    }

    pub fn declare_type(mut self, ty: Arc<TypeDescriptor>) -> Result<Self, RuntimeError> {
        self.types.insert(ty)?;
        Ok(self)
    }

    pub fn declare_type_alias(mut self, ty: Arc<TypeDescriptor>, alias: &str) -> Result<Self, RuntimeError> {
        self.types.insert_alias(ty, alias)?;
        Ok(self)
    }

    /// Declare a builtin constant. The first definition is kept.
    pub fn declare_constant(mut self, constant: ConstantEntry) -> Self {
        let name = constant.name().to_string();
        if let DeclareOutcome::Conflict { .. } = self.constants.insert(constant) {
            tracing::warn!(constant = %name, "builtin constant declared twice, keeping the first value");
        }
        self
    }

    /// Register a compiled script under its root-relative path
    pub fn declare_script<F>(mut self, path: &str, main: F) -> Result<Self, RuntimeError>
    where
        F: Fn(&mut RunContext, &mut Scope<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        self.scripts.declare(path, Arc::new(main))?;
        Ok(self)
    }

    /// Route `scheme://` inclusions to `handler`
    pub fn register_scheme(mut self, scheme: &str, handler: impl SchemeHandler + 'static) -> Self {
        self.schemes
            .insert(scheme.to_ascii_lowercase(), Arc::new(handler));
        self
    }

    pub fn build(self) -> Arc<Application> {
        tracing::debug!(
            routines = self.routines.len(),
            types = self.types.len(),
            constants = self.constants.len(),
            scripts = self.scripts.len(),
            "application seeded"
        );
        Arc::new(Application {
            routines: Arc::new(self.routines),
            types: Arc::new(self.types),
            constants: Arc::new(self.constants),
            scripts: Arc::new(self.scripts),
            schemes: self.schemes,
        })
    }
}
