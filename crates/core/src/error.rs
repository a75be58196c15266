//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is deterministic: it is raised while deciding an operation,
/// before anything is written. Infrastructure failures (lock timeouts, poisoned
/// state) live in the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A request field failed validation (e.g. empty name, malformed id).
    #[error("validation failed for `{field}`: {message}")]
    Validation { field: String, message: String },

    /// A quantity was zero, negative or otherwise unusable where a positive integer is required.
    #[error("invalid quantity for `{field}`: {message}")]
    InvalidQuantity { field: String, message: String },

    /// The operation would drive a placement (or an item total) below zero.
    #[error("insufficient stock for {item} at {scope}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        scope: String,
        requested: u64,
        available: u64,
    },

    /// Referenced item does not exist in the catalog.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// Referenced location does not exist in the registry.
    #[error("unknown location: {0}")]
    UnknownLocation(String),

    /// Referenced category does not exist.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// Assembly or BOM edit for a product without a recipe.
    #[error("no bill of materials for product {0}")]
    NoBom(String),

    /// Uniqueness or referential conflict (duplicate barcode, item still in use, ...).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_quantity(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn insufficient(
        item: impl Into<String>,
        scope: impl Into<String>,
        requested: u64,
        available: u64,
    ) -> Self {
        Self::InsufficientStock {
            item: item.into(),
            scope: scope.into(),
            requested,
            available,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// The request field the error refers to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } | Self::InvalidQuantity { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_is_reported_for_request_errors_only() {
        assert_eq!(DomainError::validation("name", "empty").field(), Some("name"));
        assert_eq!(DomainError::invalid_quantity("amount", "zero").field(), Some("amount"));
        assert_eq!(DomainError::NoBom("X".into()).field(), None);
    }

    #[test]
    fn insufficient_stock_message_names_item_and_scope() {
        let err = DomainError::insufficient("CB-302", "all locations", 5, 2);
        assert_eq!(
            err.to_string(),
            "insufficient stock for CB-302 at all locations: requested 5, available 2"
        );
    }
}
