//! Error code registry
//!
//! Error codes follow the HRxxxx scheme for errors and HWxxxx for warnings.
//! Ranges:
//! - HR00xx: Declaration errors (functions, types)
//! - HR001x: Inclusion errors
//! - HR9xxx: Internal errors
//! - HW00xx: Recoverable runtime warnings

// HR00xx - Declaration Errors
pub const FUNCTION_REDECLARED: &str = "HR0001";
pub const TYPE_REDECLARED: &str = "HR0002";
pub const TYPE_NOT_FOUND: &str = "HR0003";
pub const TYPE_MISMATCH: &str = "HR0004";
pub const SCRIPT_REDECLARED: &str = "HR0005";
pub const FUNCTION_NOT_FOUND: &str = "HR0006";

// HR001x - Inclusion Errors
pub const SCRIPT_NOT_FOUND: &str = "HR0010";

// HR9xxx - Internal Errors
pub const GENERIC_ERROR: &str = "HR9999";

// HWxxxx - Warnings
pub const CONSTANT_REDEFINED: &str = "HW0001";
pub const SCRIPT_INCLUSION_FAILED: &str = "HW0002";
pub const TEARDOWN_STEP_FAILED: &str = "HW0003";
pub const GENERIC_WARNING: &str = "HW9999";

/// Short description for a known code
pub fn describe(code: &str) -> Option<&'static str> {
    Some(match code {
        FUNCTION_REDECLARED => "a function name was bound to a second, different function",
        TYPE_REDECLARED => "a type name was bound to a second, different type",
        TYPE_NOT_FOUND => "a referenced type is not declared and autoload did not declare it",
        TYPE_MISMATCH => "a type name resolves to a different type than the one expected",
        SCRIPT_REDECLARED => "two compiled scripts were registered under the same path",
        FUNCTION_NOT_FOUND => "a function expected to be declared is not",
        SCRIPT_NOT_FOUND => "a required script could not be resolved",
        CONSTANT_REDEFINED => "a constant was declared again with a different value",
        SCRIPT_INCLUSION_FAILED => "an included script could not be resolved",
        TEARDOWN_STEP_FAILED => "a teardown step failed and was skipped",
        _ => return None,
    })
}
