//! Shared request-field validation.

use crate::error::{DomainError, DomainResult};

/// Trimmed, non-empty text.
pub fn require_text(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// Optional text: blank collapses to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
