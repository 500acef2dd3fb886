//! Declaration descriptors
//!
//! Immutable records bound into the registries: functions, types, constants
//! and compiled scripts. Descriptors are shared as `Arc`s; identity is the
//! [`DescriptorTag`] assigned at construction, never the name.

use crate::context::{RunContext, Scope};
use crate::value::{RuntimeError, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Native implementation of a declared function
pub type RoutineFn =
    Arc<dyn Fn(&mut RunContext, &[Value]) -> Result<Value, RuntimeError> + Send + Sync>;

/// Entry point of a compiled script
pub type MainFn =
    Arc<dyn Fn(&mut RunContext, &mut Scope<'_>) -> Result<Value, RuntimeError> + Send + Sync>;

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// Monotonically assigned identity of a descriptor.
///
/// Call-site caches store the tag of the descriptor they bound to and check
/// it against the registry on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorTag(u64);

impl DescriptorTag {
    /// Allocate a fresh tag, unique for the process lifetime
    pub fn next() -> Self {
        DescriptorTag(NEXT_TAG.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Index of a compiled script in the application script table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptIndex(pub(crate) u32);

impl ScriptIndex {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// A declared function
pub struct FunctionDescriptor {
    name: Arc<str>,
    entry: RoutineFn,
    declaring_unit: Option<ScriptIndex>,
    tag: DescriptorTag,
}

impl FunctionDescriptor {
    /// Create a descriptor for a function implemented by `entry`
    pub fn new<F>(name: impl AsRef<str>, entry: F) -> Self
    where
        F: Fn(&mut RunContext, &[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.as_ref()),
            entry: Arc::new(entry),
            declaring_unit: None,
            tag: DescriptorTag::next(),
        }
    }

    /// Record the script the function is declared in
    pub fn with_declaring_unit(mut self, unit: ScriptIndex) -> Self {
        self.declaring_unit = Some(unit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> DescriptorTag {
        self.tag
    }

    pub fn declaring_unit(&self) -> Option<ScriptIndex> {
        self.declaring_unit
    }

    /// Call the function
    pub fn invoke(&self, ctx: &mut RunContext, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.entry)(ctx, args)
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("declaring_unit", &self.declaring_unit)
            .field("tag", &self.tag)
            .finish()
    }
}

/// A declared class/type
#[derive(Debug)]
pub struct TypeDescriptor {
    name: Arc<str>,
    base: Option<Weak<TypeDescriptor>>,
    autoload: bool,
    tag: DescriptorTag,
}

impl TypeDescriptor {
    /// Create an autoload-eligible type with no base
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            base: None,
            autoload: true,
            tag: DescriptorTag::next(),
        }
    }

    /// Set the base type. The base is referenced, not owned.
    pub fn with_base(mut self, base: &Arc<TypeDescriptor>) -> Self {
        self.base = Some(Arc::downgrade(base));
        self
    }

    /// Whether a missing declaration of this type may be satisfied by autoload
    pub fn with_autoload(mut self, eligible: bool) -> Self {
        self.autoload = eligible;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> DescriptorTag {
        self.tag
    }

    pub fn is_autoload_eligible(&self) -> bool {
        self.autoload
    }

    /// Base type, if any and still alive
    pub fn base(&self) -> Option<Arc<TypeDescriptor>> {
        self.base.as_ref().and_then(Weak::upgrade)
    }

    /// Identity comparison
    pub fn is_same(&self, other: &TypeDescriptor) -> bool {
        self.tag == other.tag
    }
}

/// A declared constant
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantEntry {
    name: Arc<str>,
    value: Value,
    ignore_case: bool,
}

impl ConstantEntry {
    /// Case-sensitive constant
    pub fn new(name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            value: value.into(),
            ignore_case: false,
        }
    }

    /// Case-insensitive constant
    pub fn case_insensitive(name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        Self {
            ignore_case: true,
            ..Self::new(name, value)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn ignores_case(&self) -> bool {
        self.ignore_case
    }
}

/// A compiled script registered in the application
pub struct CompiledUnit {
    index: ScriptIndex,
    path: Arc<str>,
    main: MainFn,
}

impl CompiledUnit {
    pub(crate) fn new(index: ScriptIndex, path: Arc<str>, main: MainFn) -> Self {
        Self { index, path, main }
    }

    pub fn index(&self) -> ScriptIndex {
        self.index
    }

    /// Canonical path, relative to the application root, `/`-separated
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Directory part of [`path`](Self::path) (empty for root-level scripts)
    pub fn directory(&self) -> &str {
        match self.path.rfind('/') {
            Some(pos) => &self.path[..pos],
            None => "",
        }
    }

    /// Run the script's entry point
    pub fn evaluate(&self, ctx: &mut RunContext, scope: &mut Scope<'_>) -> Result<Value, RuntimeError> {
        (self.main)(ctx, scope)
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("index", &self.index)
            .field("path", &self.path)
            .finish()
    }
}
