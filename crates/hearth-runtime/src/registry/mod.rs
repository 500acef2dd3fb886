//! Symbol registries
//!
//! Each registry layers a per-run table over a shared application table:
//! application entries are visible to every run and are never shadowed.

pub mod constants;
pub mod routines;
pub mod scripts;
pub mod types;

pub use constants::{ConstantRegistry, ConstantTable, DeclareOutcome};
pub use routines::{RoutineRegistry, RoutineTable};
pub use scripts::{ScriptRegistry, ScriptTable};
pub use types::{TypeRegistry, TypeTable};

/// Lookup key for case-insensitive names (functions, types)
pub(crate) fn fold_name(name: &str) -> String {
    name.trim_start_matches('\\').to_ascii_lowercase()
}
