//! Constant registry
//!
//! First writer wins. A later declaration with a different value is
//! reported to the caller, who decides how to surface it.

use crate::descriptor::ConstantEntry;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a constant declaration
#[derive(Debug, Clone, PartialEq)]
pub enum DeclareOutcome {
    /// Newly defined
    Declared,
    /// Already defined with an equal value
    Unchanged,
    /// Already defined with a different value; the existing value is kept
    Conflict { existing: Value },
}

/// Ordered constant table
#[derive(Debug, Default, Clone)]
pub struct ConstantTable {
    entries: Vec<ConstantEntry>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ConstantEntry) -> DeclareOutcome {
        if let Some(existing) = self.get(entry.name()) {
            return if existing.value() == entry.value() {
                DeclareOutcome::Unchanged
            } else {
                DeclareOutcome::Conflict {
                    existing: existing.value().clone(),
                }
            };
        }

        let slot = self.entries.len();
        if entry.ignores_case() {
            self.folded.insert(entry.name().to_lowercase(), slot);
        } else {
            self.exact.insert(entry.name().to_string(), slot);
        }
        self.entries.push(entry);
        DeclareOutcome::Declared
    }

    /// Exact-case match first, then case-insensitive entries
    pub fn get(&self, name: &str) -> Option<&ConstantEntry> {
        self.exact
            .get(name)
            .or_else(|| self.folded.get(&name.to_lowercase()))
            .map(|&slot| &self.entries[slot])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConstantEntry> {
        self.entries.iter()
    }
}

/// Per-run constant registry
#[derive(Debug)]
pub struct ConstantRegistry {
    app: Arc<ConstantTable>,
    run: ConstantTable,
}

impl ConstantRegistry {
    pub fn new(app: Arc<ConstantTable>) -> Self {
        Self {
            app,
            run: ConstantTable::new(),
        }
    }

    /// Declare a constant. Application constants are never overridden.
    pub fn declare(&mut self, entry: ConstantEntry) -> DeclareOutcome {
        if let Some(existing) = self.app.get(entry.name()) {
            return if existing.value() == entry.value() {
                DeclareOutcome::Unchanged
            } else {
                DeclareOutcome::Conflict {
                    existing: existing.value().clone(),
                }
            };
        }
        self.run.insert(entry)
    }

    pub fn lookup(&self, name: &str) -> Option<&ConstantEntry> {
        self.app.get(name).or_else(|| self.run.get(name))
    }

    /// Value of a defined constant
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.lookup(name).map(ConstantEntry::value)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn enumerate_all(&self) -> impl Iterator<Item = &ConstantEntry> + '_ {
        self.app.iter().chain(self.run.iter())
    }

    pub fn len(&self) -> usize {
        self.app.len() + self.run.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
