//! Function registry
//!
//! Functions are keyed case-insensitively. Indices are stable for a run:
//! application routines occupy `0..app_len` and run-declared routines follow
//! in declaration order.

use super::fold_name;
use crate::descriptor::{DescriptorTag, FunctionDescriptor};
use crate::value::{DeclarationKind, RuntimeError};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered name -> function table
#[derive(Debug, Default, Clone)]
pub struct RoutineTable {
    entries: Vec<Arc<FunctionDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl RoutineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor.
    ///
    /// Returns `Ok(false)` when the identical descriptor is already present.
    pub fn insert(&mut self, descriptor: Arc<FunctionDescriptor>) -> Result<bool, RuntimeError> {
        let key = fold_name(descriptor.name());
        if let Some(&slot) = self.by_name.get(&key) {
            if self.entries[slot].tag() == descriptor.tag() {
                return Ok(false);
            }
            return Err(RuntimeError::Redeclaration {
                kind: DeclarationKind::Function,
                name: descriptor.name().to_string(),
            });
        }
        self.by_name.insert(key, self.entries.len());
        self.entries.push(descriptor);
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FunctionDescriptor>> {
        self.by_name
            .get(&fold_name(name))
            .map(|&slot| &self.entries[slot])
    }

    /// Position of `name` in declaration order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(&fold_name(name)).copied()
    }

    pub fn get_index(&self, index: usize) -> Option<&Arc<FunctionDescriptor>> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<FunctionDescriptor>> {
        self.entries.iter()
    }
}

/// Per-run function registry
#[derive(Debug)]
pub struct RoutineRegistry {
    app: Arc<RoutineTable>,
    run: RoutineTable,
}

impl RoutineRegistry {
    /// Create a registry over the application's builtin functions
    pub fn new(app: Arc<RoutineTable>) -> Self {
        Self {
            app,
            run: RoutineTable::new(),
        }
    }

    /// Declare a function for this run.
    ///
    /// Declaring the identical descriptor again is a no-op; a different
    /// descriptor under a taken name is a redeclaration.
    pub fn declare(&mut self, descriptor: Arc<FunctionDescriptor>) -> Result<(), RuntimeError> {
        if let Some(existing) = self.app.get(descriptor.name()) {
            if existing.tag() == descriptor.tag() {
                return Ok(());
            }
            return Err(RuntimeError::Redeclaration {
                kind: DeclarationKind::Function,
                name: descriptor.name().to_string(),
            });
        }
        self.run.insert(descriptor).map(|_| ())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        self.app
            .get(name)
            .or_else(|| self.run.get(name))
            .cloned()
    }

    /// Stable index of a declared function
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.app
            .position(name)
            .or_else(|| self.run.position(name).map(|i| i + self.app.len()))
    }

    pub fn lookup_by_index(&self, index: usize) -> Option<Arc<FunctionDescriptor>> {
        if index < self.app.len() {
            self.app.get_index(index).cloned()
        } else {
            self.run.get_index(index - self.app.len()).cloned()
        }
    }

    /// Whether the function bound at `descriptor`'s name still carries `expected`
    pub fn verify_identity(&self, descriptor: &FunctionDescriptor, expected: DescriptorTag) -> bool {
        descriptor.tag() == expected
            && self
                .lookup(descriptor.name())
                .is_some_and(|bound| bound.tag() == expected)
    }

    /// Whether this exact descriptor is declared
    pub fn is_declared(&self, descriptor: &FunctionDescriptor) -> bool {
        self.lookup(descriptor.name())
            .is_some_and(|bound| bound.tag() == descriptor.tag())
    }

    /// All functions, application builtins first, then declaration order
    pub fn enumerate_all(&self) -> impl Iterator<Item = &Arc<FunctionDescriptor>> + '_ {
        self.app.iter().chain(self.run.iter())
    }

    pub fn len(&self) -> usize {
        self.app.len() + self.run.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
