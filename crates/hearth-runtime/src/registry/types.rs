//! Type registry
//!
//! Like functions, types are keyed case-insensitively and cannot be
//! redeclared under a different descriptor. A declared type may additionally
//! be bound under alias names.

use super::fold_name;
use crate::descriptor::TypeDescriptor;
use crate::value::{DeclarationKind, RuntimeError};
use std::collections::HashMap;
use std::sync::Arc;

/// A type name as written at a use site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef<'a> {
    /// `self`: the caller's own type
    SelfType,
    /// `parent`: the caller's base type
    Parent,
    /// `static`: late-bound, resolved by the caller's dispatch
    Static,
    Named(&'a str),
}

impl<'a> TypeRef<'a> {
    pub fn parse(name: &'a str) -> Self {
        if name.eq_ignore_ascii_case("self") {
            TypeRef::SelfType
        } else if name.eq_ignore_ascii_case("parent") {
            TypeRef::Parent
        } else if name.eq_ignore_ascii_case("static") {
            TypeRef::Static
        } else {
            TypeRef::Named(name)
        }
    }
}

/// Name -> type table with alias bindings
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    entries: Vec<Arc<TypeDescriptor>>,
    names: HashMap<String, (Arc<str>, Arc<TypeDescriptor>)>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor under its canonical name.
    ///
    /// Returns `Ok(false)` when the identical descriptor is already present.
    pub fn insert(&mut self, descriptor: Arc<TypeDescriptor>) -> Result<bool, RuntimeError> {
        let inserted = self.bind(descriptor.name(), descriptor.clone())?;
        if inserted {
            self.entries.push(descriptor);
        }
        Ok(inserted)
    }

    /// Bind `alias` to `descriptor`, inserting the descriptor if needed
    pub fn insert_alias(
        &mut self,
        descriptor: Arc<TypeDescriptor>,
        alias: &str,
    ) -> Result<bool, RuntimeError> {
        self.insert(descriptor.clone())?;
        self.bind(alias, descriptor)
    }

    /// Bind a lookup name only; the descriptor is not listed as an entry
    fn bind(&mut self, name: &str, descriptor: Arc<TypeDescriptor>) -> Result<bool, RuntimeError> {
        let key = fold_name(name);
        if let Some((_, bound)) = self.names.get(&key) {
            if bound.is_same(&descriptor) {
                return Ok(false);
            }
            return Err(RuntimeError::Redeclaration {
                kind: DeclarationKind::Type,
                name: name.to_string(),
            });
        }
        self.names.insert(key, (Arc::from(name), descriptor));
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.names.get(&fold_name(name)).map(|(_, bound)| bound)
    }

    /// Names other than the canonical one bound to `descriptor`
    pub fn aliases_of(&self, descriptor: &TypeDescriptor) -> Vec<Arc<str>> {
        let canonical = fold_name(descriptor.name());
        let mut aliases: Vec<Arc<str>> = self
            .names
            .iter()
            .filter(|(key, (_, bound))| **key != canonical && bound.is_same(descriptor))
            .map(|(_, (name, _))| name.clone())
            .collect();
        aliases.sort();
        aliases
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<TypeDescriptor>> {
        self.entries.iter()
    }
}

/// Per-run type registry
#[derive(Debug)]
pub struct TypeRegistry {
    app: Arc<TypeTable>,
    run: TypeTable,
}

impl TypeRegistry {
    pub fn new(app: Arc<TypeTable>) -> Self {
        Self {
            app,
            run: TypeTable::new(),
        }
    }

    pub fn declare(&mut self, descriptor: Arc<TypeDescriptor>) -> Result<(), RuntimeError> {
        let name = descriptor.name().to_string();
        self.check_app_binding(&name, &descriptor)?;
        if self.is_app_type(&descriptor) {
            return Ok(());
        }
        self.run.insert(descriptor).map(|_| ())
    }

    /// Bind an additional name to `descriptor`, declaring it first if needed
    pub fn declare_alias(
        &mut self,
        descriptor: Arc<TypeDescriptor>,
        alias: &str,
    ) -> Result<(), RuntimeError> {
        self.check_app_binding(alias, &descriptor)?;
        if self.app.get(alias).is_some() {
            // already bound to this descriptor at application level
            return Ok(());
        }
        if self.is_app_type(&descriptor) {
            // alias of a builtin: bind the name only
            return self.run.bind(alias, descriptor).map(|_| ());
        }
        self.declare(descriptor.clone())?;
        self.run.insert_alias(descriptor, alias).map(|_| ())
    }

    /// Pure lookup by canonical name or alias; never autoloads
    pub fn lookup(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.app.get(name).or_else(|| self.run.get(name)).cloned()
    }

    pub fn is_declared(&self, descriptor: &TypeDescriptor) -> bool {
        self.lookup(descriptor.name())
            .is_some_and(|bound| bound.is_same(descriptor))
    }

    pub fn aliases_of(&self, descriptor: &TypeDescriptor) -> Vec<Arc<str>> {
        let mut aliases = self.app.aliases_of(descriptor);
        aliases.extend(self.run.aliases_of(descriptor));
        aliases
    }

    /// All distinct types, application builtins first
    pub fn enumerate_all(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> + '_ {
        self.app.iter().chain(self.run.iter())
    }

    pub fn len(&self) -> usize {
        self.app.len() + self.run.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_app_type(&self, descriptor: &TypeDescriptor) -> bool {
        self.app
            .get(descriptor.name())
            .is_some_and(|t| t.is_same(descriptor))
    }

    fn check_app_binding(&self, name: &str, descriptor: &TypeDescriptor) -> Result<(), RuntimeError> {
        match self.app.get(name) {
            Some(bound) if !bound.is_same(descriptor) => Err(RuntimeError::Redeclaration {
                kind: DeclarationKind::Type,
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
