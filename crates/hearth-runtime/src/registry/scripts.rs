//! Compiled script table and per-run inclusion state

use crate::descriptor::{CompiledUnit, MainFn, ScriptIndex};
use crate::inclusion::normalize_path;
use crate::value::{DeclarationKind, RuntimeError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Process-wide path -> compiled unit map
///
/// Built once while seeding the application; read-only afterwards.
#[derive(Debug, Default)]
pub struct ScriptTable {
    units: Vec<Arc<CompiledUnit>>,
    by_path: HashMap<String, ScriptIndex>,
}

impl ScriptTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script under its root-relative path
    pub fn declare(&mut self, path: &str, main: MainFn) -> Result<Arc<CompiledUnit>, RuntimeError> {
        let canonical = normalize_path(path);
        if canonical.is_empty() || self.by_path.contains_key(&canonical) {
            return Err(RuntimeError::Redeclaration {
                kind: DeclarationKind::Script,
                name: path.to_string(),
            });
        }

        let index = ScriptIndex(self.units.len() as u32);
        let unit = Arc::new(CompiledUnit::new(index, Arc::from(canonical.as_str()), main));
        self.by_path.insert(canonical, index);
        self.units.push(unit.clone());
        Ok(unit)
    }

    /// Find a unit by root-relative path; the path is normalized first
    pub fn lookup(&self, path: &str) -> Option<Arc<CompiledUnit>> {
        self.by_path
            .get(&normalize_path(path))
            .and_then(|index| self.get(*index))
    }

    pub fn get(&self, index: ScriptIndex) -> Option<Arc<CompiledUnit>> {
        self.units.get(index.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<CompiledUnit>> {
        self.units.iter()
    }
}

/// Per-run script state: which units were included during this run
#[derive(Debug)]
pub struct ScriptRegistry {
    table: Arc<ScriptTable>,
    included: HashSet<ScriptIndex>,
}

impl ScriptRegistry {
    pub fn new(table: Arc<ScriptTable>) -> Self {
        Self {
            table,
            included: HashSet::new(),
        }
    }

    pub fn table(&self) -> &ScriptTable {
        &self.table
    }

    pub fn lookup(&self, path: &str) -> Option<Arc<CompiledUnit>> {
        self.table.lookup(path)
    }

    pub fn is_included_this_run(&self, unit: &CompiledUnit) -> bool {
        self.included.contains(&unit.index())
    }

    /// Set the unit's included bit. Returns `false` if it was already set.
    pub fn mark_included_this_run(&mut self, unit: &CompiledUnit) -> bool {
        self.included.insert(unit.index())
    }

    /// Units included so far, in table order
    pub fn included(&self) -> Vec<Arc<CompiledUnit>> {
        self.table
            .iter()
            .filter(|unit| self.included.contains(&unit.index()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn main_fn() -> MainFn {
        Arc::new(|_, _| Ok(Value::Null))
    }

    #[test]
    fn test_declare_normalizes_paths() {
        let mut table = ScriptTable::new();
        let unit = table.declare("lib\\util/./str.ext", main_fn()).unwrap();

        assert_eq!(unit.path(), "lib/util/str.ext");
        assert_eq!(table.lookup("/lib//util/str.ext").unwrap().index(), unit.index());
        assert!(table.lookup("lib/str.ext").is_none());
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut table = ScriptTable::new();
        table.declare("a.ext", main_fn()).unwrap();

        let err = table.declare("./a.ext", main_fn()).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Redeclaration {
                kind: DeclarationKind::Script,
                ..
            }
        ));
    }

    #[test]
    fn test_included_bit_is_per_run() {
        let mut table = ScriptTable::new();
        let unit = table.declare("a.ext", main_fn()).unwrap();
        let table = Arc::new(table);

        let mut first = ScriptRegistry::new(table.clone());
        let second = ScriptRegistry::new(table);

        assert!(first.mark_included_this_run(&unit));
        assert!(!first.mark_included_this_run(&unit));
        assert!(first.is_included_this_run(&unit));
        assert!(!second.is_included_this_run(&unit));
        assert_eq!(first.included().len(), 1);
    }
}
