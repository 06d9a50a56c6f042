//! # Validation Module
//!
//! Input validation for inventory operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (sale workflow, API handlers)                         │
//! │  └── Deserialization, tenant resolution, authorization                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── quantity > 0                                                      │
//! │  └── actor / reference / notes / batch shape                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (total_qty = available_qty + reserved_qty)                  │
//! │  ├── CHECK (quantity > 0)                                              │
//! │  └── append-only triggers on stock_movements                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_actor, validate_quantity};
//!
//! validate_quantity(5).unwrap();
//! assert!(validate_quantity(0).is_err());
//! assert!(validate_actor("").is_err());
//! ```

use crate::error::{StockError, StockResult, ValidationError};
use crate::types::OperationContext;
use crate::{MAX_ACTOR_LEN, MAX_NOTES_LEN, MAX_PRODUCT_ID_LEN, MAX_REFERENCE_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity supplied to a mutating operation.
///
/// ## Rules
/// - Must be positive (> 0); no upper cap, overflow is checked where counters
///   are updated
pub fn validate_quantity(qty: i64) -> StockResult<()> {
    if qty <= 0 {
        return Err(StockError::InvalidQuantity { requested: qty });
    }
    Ok(())
}

/// Validates the number of lines in a bulk request.
///
/// ## Rules
/// - At least one line
/// - At most `max` lines (bounded by a sale's line-item count)
pub fn validate_batch_size(lines: usize, max: usize) -> ValidationResult<()> {
    if lines == 0 || lines > max {
        return Err(ValidationError::OutOfRange {
            field: "batch lines".to_string(),
            min: 1,
            max: max as i64,
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product identifier.
pub fn validate_product_id(product_id: &str) -> ValidationResult<()> {
    required("product_id", product_id, MAX_PRODUCT_ID_LEN)
}

/// Validates the actor recorded on every movement.
pub fn validate_actor(actor: &str) -> ValidationResult<()> {
    required("actor", actor, MAX_ACTOR_LEN)
}

/// Validates an optional correlation reference (e.g. a sale id).
pub fn validate_reference(reference: Option<&str>) -> ValidationResult<()> {
    optional("reference", reference, MAX_REFERENCE_LEN)
}

/// Validates optional free-text notes.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<()> {
    optional("notes", notes, MAX_NOTES_LEN)
}

/// Validates a full operation context.
pub fn validate_context(ctx: &OperationContext) -> ValidationResult<()> {
    validate_actor(&ctx.actor)?;
    validate_reference(ctx.reference.as_deref())?;
    validate_notes(ctx.notes.as_deref())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (no filtering)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

fn required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    optional(field, Some(value), max)
}

fn optional(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_BATCH_LINES;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(1_000_000).is_ok());

        assert_eq!(
            validate_quantity(0),
            Err(StockError::InvalidQuantity { requested: 0 })
        );
        assert!(validate_quantity(-1).is_err());
    }

    #[test]
    fn test_validate_batch_size() {
        assert!(validate_batch_size(1, MAX_BATCH_LINES).is_ok());
        assert!(validate_batch_size(MAX_BATCH_LINES, MAX_BATCH_LINES).is_ok());
        assert!(validate_batch_size(0, MAX_BATCH_LINES).is_err());
        assert!(validate_batch_size(MAX_BATCH_LINES + 1, MAX_BATCH_LINES).is_err());
    }

    #[test]
    fn test_validate_actor() {
        assert!(validate_actor("cashier-1").is_ok());
        assert_eq!(
            validate_actor("   "),
            Err(ValidationError::Required {
                field: "actor".to_string()
            })
        );
        assert!(validate_actor(&"a".repeat(MAX_ACTOR_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_context() {
        let ctx = OperationContext::new("u").with_reference("sale-1");
        assert!(validate_context(&ctx).is_ok());

        let ctx = OperationContext::new("u").with_notes("x".repeat(MAX_NOTES_LEN + 1));
        assert!(matches!(
            validate_context(&ctx),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  cola ").unwrap(), "cola");
        assert_eq!(validate_search_query("").unwrap(), "");
        assert!(validate_search_query(&"q".repeat(101)).is_err());
    }
}
