//! # Inventory Error Type
//!
//! What every coordinator call returns on failure.
//!
//! ## Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  InventoryError                     kind()                  retryable   │
//! │  ─────────────────────────────      ─────────────────────   ─────────   │
//! │  Stock(InvalidQuantity|Overflow)    INVALID_QUANTITY        no          │
//! │  Stock(InsufficientStock)           INSUFFICIENT_STOCK      no          │
//! │  Stock(InsufficientReserved..)      INSUFFICIENT_RESERVED   no          │
//! │  Stock(InvalidReason|Validation)    VALIDATION_ERROR        no          │
//! │  NotFound                           NOT_FOUND               no          │
//! │  AlreadyExists                      ALREADY_EXISTS          no          │
//! │  BatchLine { source, .. }           source.kind()           source      │
//! │  Storage(DbError)                   STORAGE_ERROR           yes         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A storage error means "outcome unknown to this layer": nothing here
//! retries, and the caller must not assume the write committed or rolled
//! back unless it knows the transaction never reached commit.

use serde::Serialize;
use thiserror::Error;

use crate::error::DbError;
use tally_core::{ErrorKind, StockError, ValidationError};

/// Error returned by [`super::InventoryService`].
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Quantity rule or input violation, unchanged from the domain.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// No stock record for the product.
    #[error("Stock record not found for product {0}")]
    NotFound(String),

    /// The product already has a stock record.
    #[error("Stock record already exists for product {0}")]
    AlreadyExists(String),

    /// One line of a bulk request failed; the whole batch was rolled back.
    #[error("Batch line {index} (product {product_id}) failed: {source}")]
    BatchLine {
        index: usize,
        product_id: String,
        #[source]
        source: Box<InventoryError>,
    },

    /// Persistence failure, including optimistic-version conflicts.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

impl From<ValidationError> for InventoryError {
    fn from(err: ValidationError) -> Self {
        InventoryError::Stock(StockError::Validation(err))
    }
}

impl From<sqlx::Error> for InventoryError {
    fn from(err: sqlx::Error) -> Self {
        InventoryError::Storage(err.into())
    }
}

impl InventoryError {
    /// Returns the stable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::Stock(err) => err.kind(),
            InventoryError::NotFound(_) => ErrorKind::NotFound,
            InventoryError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            InventoryError::BatchLine { source, .. } => source.kind(),
            InventoryError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether the caller may retry the same call.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }

    /// Wraps an error with the index and product of the failing batch line.
    pub(crate) fn at_line(self, index: usize, product_id: &str) -> Self {
        InventoryError::BatchLine {
            index,
            product_id: product_id.to_string(),
            source: Box::new(self),
        }
    }

    /// Zero-based index of the failing line, for bulk errors.
    pub fn failed_line(&self) -> Option<usize> {
        match self {
            InventoryError::BatchLine { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Result type for coordinator operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

// =============================================================================
// Wire Shape
// =============================================================================

/// Error body handed to the surrounding service's API layer.
///
/// ```json
/// { "code": "INSUFFICIENT_STOCK", "message": "Insufficient stock for p-1: available 3, requested 5" }
/// ```
///
/// Storage details are logged, not exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl From<&InventoryError> for ErrorResponse {
    fn from(err: &InventoryError) -> Self {
        let message = match err {
            InventoryError::Storage(db) => {
                tracing::error!(error = %db, "Inventory storage operation failed");
                if db.is_transient() {
                    "Inventory is busy, please retry".to_string()
                } else {
                    "Inventory storage operation failed".to_string()
                }
            }
            other => other.to_string(),
        };

        ErrorResponse {
            code: err.kind(),
            message,
            line: err.failed_line(),
        }
    }
}
