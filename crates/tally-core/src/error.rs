//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── StockError       - Quantity rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Stable machine-readable kind                   │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── InventoryError   - What the coordinator returns                   │
//! │                                                                         │
//! │  Flow: ValidationError → StockError → InventoryError → caller's API    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quantity errors are produced before any write is attempted, so they are
//! always safe to retry once the input is corrected.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Stock Error
// =============================================================================

/// Quantity rule violations raised by [`crate::StockRecord`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    /// Zero or negative quantity supplied to a mutating operation.
    #[error("Quantity must be positive, got {requested}")]
    InvalidQuantity { requested: i64 },

    /// Removal or reservation exceeds the available quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to sale (qty: 5)
    ///      │
    ///      ▼
    /// reserve_stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Release or confirmation exceeds the reserved quantity.
    #[error(
        "Insufficient reserved stock for {product_id}: reserved {reserved}, requested {requested}"
    )]
    InsufficientReservedStock {
        product_id: String,
        reserved: i64,
        requested: i64,
    },

    /// The resulting counter would not fit in an i64.
    #[error("Quantity {requested} overflows the stock counters for {product_id}")]
    QuantityOverflow { product_id: String, requested: i64 },

    /// Movement reason not permitted for the requested operation.
    #[error("Reason '{reason}' is not allowed for {operation}")]
    InvalidReason { reason: String, operation: String },

    /// A movement log that drives a counter below zero, or past `i64::MAX`,
    /// when replayed.
    #[error("Movement {movement_id} cannot be replayed: {reason}")]
    Replay { movement_id: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl StockError {
    /// Returns the stable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StockError::InvalidQuantity { .. } | StockError::QuantityOverflow { .. } => {
                ErrorKind::InvalidQuantity
            }
            StockError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            StockError::InsufficientReservedStock { .. } => ErrorKind::InsufficientReservedStock,
            StockError::InvalidReason { .. }
            | StockError::Replay { .. }
            | StockError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements
/// (actor, reference, notes, batch shape, search text).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Error Kind
// =============================================================================

/// Stable, machine-readable error kind.
///
/// The surrounding service translates these into its own API error format:
/// ```json
/// { "code": "INSUFFICIENT_STOCK", "message": "Insufficient stock for ..." }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorKind {
    /// Non-positive (or overflowing) quantity.
    InvalidQuantity,
    /// Removal/reservation exceeds available quantity.
    InsufficientStock,
    /// Release/confirmation exceeds reserved quantity.
    InsufficientReservedStock,
    /// No stock record for the product.
    NotFound,
    /// Product already has a stock record.
    AlreadyExists,
    /// Malformed input other than quantity.
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// Opaque persistence failure, including transaction conflicts.
    #[serde(rename = "STORAGE_ERROR")]
    Storage,
}

impl ErrorKind {
    /// Returns the wire code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidQuantity => "INVALID_QUANTITY",
            ErrorKind::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorKind::InsufficientReservedStock => "INSUFFICIENT_RESERVED_STOCK",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Storage => "STORAGE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with StockError.
pub type StockResult<T> = Result<T, StockError>;

// =============================================================================
// Unit Tests
// =============================================================================
