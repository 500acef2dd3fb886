//! Runtime value representation
//!
//! Values seen by the runtime core: constant values, include results,
//! variable scopes handed to script entry points.
//! - Int, Float, Bool, Null: Immediate values
//! - Strings: Heap-allocated, reference-counted (Arc<str>), immutable
//! - Arrays: Copy-on-write (ValueArray wrapping Arc<Vec<Value>>), value semantics
//! - Locals: Copy-on-write variable scope (name -> value)

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::diagnostic::{error_codes, Diagnostic};

/// Copy-on-write array. Cheap to clone (refcount bump).
/// Mutations on a shared array clone the inner Vec first (Arc::make_mut).
#[derive(Clone, Debug, Default)]
pub struct ValueArray(Arc<Vec<Value>>);

impl ValueArray {
    pub fn new() -> Self {
        ValueArray(Arc::new(Vec::new()))
    }

    pub fn from_vec(v: Vec<Value>) -> Self {
        ValueArray(Arc::new(v))
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Mutating access, clones the backing Vec if shared
    pub fn push(&mut self, value: Value) {
        Arc::make_mut(&mut self.0).push(value);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

impl PartialEq for ValueArray {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl From<Vec<Value>> for ValueArray {
    fn from(v: Vec<Value>) -> Self {
        ValueArray::from_vec(v)
    }
}

impl FromIterator<Value> for ValueArray {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ValueArray(Arc::new(iter.into_iter().collect()))
    }
}

/// Copy-on-write variable scope. Cheap to clone (refcount bump).
///
/// Passed to script entry points as their local variables; the run's global
/// scope is one of these.
#[derive(Clone, Debug, Default)]
pub struct Locals(Arc<HashMap<String, Value>>);

impl Locals {
    pub fn new() -> Self {
        Locals(Arc::new(HashMap::new()))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        Arc::make_mut(&mut self.0).insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        Arc::make_mut(&mut self.0).remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::collections::hash_map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl PartialEq for Locals {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

/// Runtime value type
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating-point value (IEEE 754 double-precision)
    Float(f64),
    /// String value (reference-counted, immutable)
    String(Arc<str>),
    /// Array value (copy-on-write, value semantics)
    Array(ValueArray),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
        }
    }

    /// `true` for `Bool(true)`, the success result of a skipped once-inclusion
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// `true` for `Bool(false)`, the failure result of an inclusion
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ValueArray::from_vec(items))
    }
}

/// What kind of symbol a declaration binds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Function,
    Type,
    Script,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationKind::Function => write!(f, "function"),
            DeclarationKind::Type => write!(f, "type"),
            DeclarationKind::Script => write!(f, "script"),
        }
    }
}

/// Runtime error type
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A name already bound to a different descriptor
    #[error("Cannot redeclare {kind} {name}")]
    Redeclaration { kind: DeclarationKind, name: String },
    /// Function expected to be declared is not
    #[error("Call to undefined function {name}()")]
    FunctionNotFound { name: String },
    /// Type not declared, even after autoload
    #[error("Type '{name}' not found")]
    TypeNotFound { name: String },
    /// A type name resolves to a different descriptor than the expected one
    #[error("Type '{name}' resolves to a different declaration than expected")]
    TypeMismatch { name: String },
    /// `static` must be resolved by the caller's dispatch, not the registry
    #[error("'static' cannot be resolved without late static binding")]
    LateStaticBinding,
    /// Required script could not be resolved
    #[error("Failed opening required '{path}'")]
    ScriptNotFound { path: String },
    /// I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Error raised by script code
    #[error("{0}")]
    Script(String),
}

impl RuntimeError {
    /// Error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::Redeclaration {
                kind: DeclarationKind::Function,
                ..
            } => error_codes::FUNCTION_REDECLARED,
            RuntimeError::Redeclaration {
                kind: DeclarationKind::Type,
                ..
            } => error_codes::TYPE_REDECLARED,
            RuntimeError::Redeclaration {
                kind: DeclarationKind::Script,
                ..
            } => error_codes::SCRIPT_REDECLARED,
            RuntimeError::FunctionNotFound { .. } => error_codes::FUNCTION_NOT_FOUND,
            RuntimeError::TypeNotFound { .. } => error_codes::TYPE_NOT_FOUND,
            RuntimeError::TypeMismatch { .. } => error_codes::TYPE_MISMATCH,
            RuntimeError::ScriptNotFound { .. } => error_codes::SCRIPT_NOT_FOUND,
            _ => error_codes::GENERIC_ERROR,
        }
    }

    /// Convert to an error diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error_with_code(self.code(), self.to_string())
    }
}
