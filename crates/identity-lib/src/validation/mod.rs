// ============================
// crates/identity-lib/src/validation/mod.rs
// ============================
//! Request field validation.

use crate::error::AppError;

/// Check that every named field carries a non-blank value.
///
/// All missing fields are reported in one error, in the order given.
pub fn require_non_empty(fields: &[(&str, &str)]) -> Result<(), AppError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )))
    }
}
