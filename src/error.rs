/// Error types for LiveSeries
///
/// Every fallible operation on a series, table or view returns [`Result`].
/// Errors are fatal to the call that produced them, never to the entity:
/// the series or table is left unchanged and the caller may retry.

use crate::changes::EntityId;
use crate::value::ValueKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Index outside `[0, len)`
    #[error("Index {index} out of range [0, {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Numeric coercion or natural ordering requested on incompatible data
    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Series label '{0}' already exists")]
    DuplicateLabel(String),

    #[error("Series label '{0}' not found")]
    UnknownLabel(String),

    /// Wrong number of inputs (calc views) or cells (table rows)
    #[error("Expected {expected} inputs, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// External mutation of a view's output
    #[error("Entity {0} is a derived view and cannot be mutated directly")]
    ReadOnly(EntityId),
}

impl Error {
    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }

    pub(crate) fn kind_mismatch(expected: ValueKind, found: impl std::fmt::Debug) -> Self {
        Error::TypeMismatch {
            expected: format!("{:?}", expected),
            found: format!("{:?}", found),
        }
    }

    pub(crate) fn not_numeric(kind: ValueKind) -> Self {
        Error::TypeMismatch {
            expected: "numeric series".to_string(),
            found: format!("{:?}", kind),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
