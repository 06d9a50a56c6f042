//! # Domain Types
//!
//! Supporting types shared by the stock and movement modules: the product
//! catalog entry the stock listing joins against, the caller context carried
//! by every mutating call, batch lines, and list filters.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐      │
//! │  │    Product       │  │ OperationContext │  │    BatchLine     │      │
//! │  │  ─────────────   │  │  ─────────────   │  │  ─────────────   │      │
//! │  │  id (UUID)       │  │  actor           │  │  product_id      │      │
//! │  │  tenant_id       │  │  reference       │  │  quantity        │      │
//! │  │  sku / name      │  │  notes           │  │                  │      │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────┘      │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐      │
//! │  │   StockFilter    │  │  MovementFilter  │  │      Page        │      │
//! │  │  low / out /     │  │  type / reason / │  │  limit / offset  │      │
//! │  │  search / tenant │  │  range / ref     │  │                  │      │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::movement::{MovementReason, MovementType};
use crate::stock::StockRecord;
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

// =============================================================================
// Product
// =============================================================================

/// Catalog entry owned by the product lifecycle service.
///
/// The inventory core only reads it (search join, tenant scoping). A stock
/// record references it weakly by `product_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this product belongs to.
    pub tenant_id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name.
    pub name: String,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Operation Context
// =============================================================================

/// Who is performing a mutation and what it correlates to.
///
/// Recorded verbatim on the movement record. No authorization happens here:
/// the caller has already authorized `actor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OperationContext {
    /// Opaque actor identifier (user id, service name).
    pub actor: String,

    /// Correlation id of the originating business transaction (e.g. sale id).
    pub reference: Option<String>,

    /// Free-text notes.
    pub notes: Option<String>,
}

impl OperationContext {
    /// Creates a context for the given actor.
    pub fn new(actor: impl Into<String>) -> Self {
        OperationContext {
            actor: actor.into(),
            reference: None,
            notes: None,
        }
    }

    /// Sets the correlation reference.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Sets free-text notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

// =============================================================================
// Batch Line
// =============================================================================

/// One line of a bulk reservation, release, or confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BatchLine {
    pub product_id: String,
    pub quantity: i64,
}

impl BatchLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        BatchLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Limit/offset page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Creates a page, clamping `limit` to `1..=MAX_PAGE_SIZE`.
    pub fn new(limit: u32, offset: u32) -> Self {
        Page {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset,
        }
    }

    /// First page with the given size.
    pub fn first(limit: u32) -> Self {
        Page::new(limit, 0)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(DEFAULT_PAGE_SIZE, 0)
    }
}

// =============================================================================
// Stock Listing
// =============================================================================

/// Filter for listing stock records.
///
/// `low_stock` and `out_of_stock` combine with AND; an out-of-stock record is
/// also low-stock whenever its reorder level is non-negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockFilter {
    /// Restrict to products of one tenant.
    pub tenant_id: Option<String>,
    /// Only records with `available_qty <= reorder_level`.
    pub low_stock: bool,
    /// Only records with `available_qty == 0`.
    pub out_of_stock: bool,
    /// Free text matched against product sku, name, barcode and product id.
    pub search: Option<String>,
}

impl StockFilter {
    pub fn low_stock() -> Self {
        StockFilter {
            low_stock: true,
            ..Default::default()
        }
    }

    pub fn out_of_stock() -> Self {
        StockFilter {
            out_of_stock: true,
            ..Default::default()
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        StockFilter {
            search: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// A stock record joined with its product's catalog fields.
///
/// Catalog fields are optional: the product reference is weak and the
/// catalog row may be gone.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockListing {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stock: StockRecord,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub tenant_id: Option<String>,
}

// =============================================================================
// Movement Queries
// =============================================================================

/// Filter for movement reporting queries. All set fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub movement_type: Option<MovementType>,
    pub reason: Option<MovementReason>,
    pub reference: Option<String>,
    /// Inclusive lower bound on `created_at`.
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
}

impl MovementFilter {
    pub fn product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn of_type(mut self, movement_type: MovementType) -> Self {
        self.movement_type = Some(movement_type);
        self
    }

    pub fn reason(mut self, reason: MovementReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

/// Aggregated movement volume for one (type, reason) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MovementSummary {
    pub movement_type: MovementType,
    pub reason: MovementReason,
    pub count: i64,
    pub quantity: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps_limit() {
        assert_eq!(Page::new(0, 0).limit, 1);
        assert_eq!(Page::new(10_000, 5).limit, MAX_PAGE_SIZE);
        assert_eq!(Page::default().limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_operation_context_builder() {
        let ctx = OperationContext::new("cashier-1")
            .with_reference("sale-42")
            .with_notes("lane 3");
        assert_eq!(ctx.actor, "cashier-1");
        assert_eq!(ctx.reference.as_deref(), Some("sale-42"));
        assert_eq!(ctx.notes.as_deref(), Some("lane 3"));
    }

    #[test]
    fn test_stock_filter_constructors() {
        let filter = StockFilter::low_stock().for_tenant("t-1");
        assert!(filter.low_stock);
        assert!(!filter.out_of_stock);
        assert_eq!(filter.tenant_id.as_deref(), Some("t-1"));
    }
}
