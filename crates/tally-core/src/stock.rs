//! # Stock Record
//!
//! Per-product quantity counters and the five canonical state transitions.
//!
//! ## Counters
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One StockRecord per product                          │
//! │                                                                         │
//! │     available_qty  +  reserved_qty  =  total_qty   (always, all >= 0)  │
//! │                                                                         │
//! │  add_stock(q)              available += q            total += q        │
//! │  remove_stock(q)           available -= q            total -= q        │
//! │  reserve_stock(q)          available -= q, reserved += q               │
//! │  release_reserved_stock(q) reserved  -= q, available += q              │
//! │  confirm_reserved_stock(q) reserved  -= q            total -= q        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two-Phase Sale Path
//! ```text
//!   Sale line added ──► reserve_stock(q)
//!         │
//!         ├── sale cancelled ──► release_reserved_stock(q)   (fully reversible)
//!         │
//!         └── sale completed ──► confirm_reserved_stock(q)   (stock leaves)
//!
//!   Damage / manual correction ──► remove_stock(q)           (single phase)
//! ```
//!
//! Every operation validates before it mutates: on error the record is
//! untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{StockError, StockResult, ValidationError};
use crate::movement::{MovementReason, MovementType};
use crate::validation::validate_quantity;

// =============================================================================
// Stock Status
// =============================================================================

/// Display status derived from the available quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum StockStatus {
    #[serde(rename = "In Stock")]
    InStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::OutOfStock => "Out of Stock",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Stock Record
// =============================================================================

/// Quantity state for one product.
///
/// Counters are private: they change only through the operations below, so
/// the `total = available + reserved` invariant cannot be broken from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockRecord {
    id: String,
    product_id: String,
    available_qty: i64,
    reserved_qty: i64,
    total_qty: i64,
    reorder_level: i64,
    #[ts(as = "Option<String>")]
    last_movement_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    created_at: DateTime<Utc>,
    #[ts(as = "String")]
    updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped on every persisted write.
    version: i64,
}

impl StockRecord {
    /// Creates a stock record for a newly tracked product.
    ///
    /// `last_movement_at` stays empty when `initial_qty` is zero, since no
    /// movement is recorded for an empty start.
    pub fn new(
        product_id: impl Into<String>,
        initial_qty: i64,
        reorder_level: i64,
    ) -> StockResult<Self> {
        if initial_qty < 0 {
            return Err(StockError::InvalidQuantity {
                requested: initial_qty,
            });
        }
        if reorder_level < 0 {
            return Err(ValidationError::OutOfRange {
                field: "reorder_level".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        let now = Utc::now();
        Ok(StockRecord {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.into(),
            available_qty: initial_qty,
            reserved_qty: 0,
            total_qty: initial_qty,
            reorder_level,
            last_movement_at: (initial_qty > 0).then_some(now),
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn available_qty(&self) -> i64 {
        self.available_qty
    }

    pub fn reserved_qty(&self) -> i64 {
        self.reserved_qty
    }

    pub fn total_qty(&self) -> i64 {
        self.total_qty
    }

    pub fn reorder_level(&self) -> i64 {
        self.reorder_level
    }

    pub fn last_movement_at(&self) -> Option<DateTime<Utc>> {
        self.last_movement_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Receives `qty` units into available stock.
    pub fn add_stock(&mut self, qty: i64) -> StockResult<()> {
        validate_quantity(qty)?;
        let available = self.checked(self.available_qty.checked_add(qty), qty)?;
        let total = self.checked(available.checked_add(self.reserved_qty), qty)?;

        self.available_qty = available;
        self.total_qty = total;
        self.touch();
        Ok(())
    }

    /// Removes `qty` units from available stock (damage, expiry, correction).
    pub fn remove_stock(&mut self, qty: i64) -> StockResult<()> {
        validate_quantity(qty)?;
        self.ensure_available(qty)?;

        self.available_qty -= qty;
        self.recompute_total();
        self.touch();
        Ok(())
    }

    /// Moves `qty` units from available to reserved. Total is unchanged.
    pub fn reserve_stock(&mut self, qty: i64) -> StockResult<()> {
        validate_quantity(qty)?;
        self.ensure_available(qty)?;

        self.available_qty -= qty;
        self.reserved_qty += qty;
        self.touch();
        Ok(())
    }

    /// Moves `qty` units from reserved back to available. Total is unchanged.
    pub fn release_reserved_stock(&mut self, qty: i64) -> StockResult<()> {
        validate_quantity(qty)?;
        self.ensure_reserved(qty)?;

        self.reserved_qty -= qty;
        self.available_qty += qty;
        self.touch();
        Ok(())
    }

    /// Consumes `qty` reserved units for a completed sale.
    ///
    /// Only `reserved_qty` decreases: the units already left available stock
    /// when they were reserved.
    pub fn confirm_reserved_stock(&mut self, qty: i64) -> StockResult<()> {
        validate_quantity(qty)?;
        self.ensure_reserved(qty)?;

        self.reserved_qty -= qty;
        self.recompute_total();
        self.touch();
        Ok(())
    }

    /// Sets the low-stock threshold. Not a quantity change, so
    /// `last_movement_at` is left alone.
    pub fn set_reorder_level(&mut self, reorder_level: i64) -> StockResult<()> {
        if reorder_level < 0 {
            return Err(ValidationError::OutOfRange {
                field: "reorder_level".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        self.reorder_level = reorder_level;
        self.updated_at = Utc::now();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn is_low_stock(&self) -> bool {
        self.available_qty <= self.reorder_level
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.available_qty == 0
    }

    pub fn can_fulfill_order(&self, qty: i64) -> bool {
        qty <= self.available_qty
    }

    /// "Out of Stock" takes precedence over "Low Stock".
    pub fn stock_status(&self) -> StockStatus {
        if self.is_out_of_stock() {
            StockStatus::OutOfStock
        } else if self.is_low_stock() {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    /// Checks the counter invariants.
    ///
    /// Records decoded from storage or deserialized from callers are not
    /// trusted: the store runs this before every write.
    pub fn check_invariants(&self) -> StockResult<()> {
        let consistent = self.available_qty >= 0
            && self.reserved_qty >= 0
            && self.total_qty >= 0
            && self.reorder_level >= 0
            && self.available_qty.checked_add(self.reserved_qty) == Some(self.total_qty);

        if consistent {
            Ok(())
        } else {
            Err(ValidationError::NotAllowed {
                field: format!(
                    "stock counters for {} (available {}, reserved {}, total {})",
                    self.product_id, self.available_qty, self.reserved_qty, self.total_qty
                ),
                allowed: vec!["total = available + reserved, all >= 0".to_string()],
            }
            .into())
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn ensure_available(&self, qty: i64) -> StockResult<()> {
        if qty > self.available_qty {
            return Err(StockError::InsufficientStock {
                product_id: self.product_id.clone(),
                available: self.available_qty,
                requested: qty,
            });
        }
        Ok(())
    }

    fn ensure_reserved(&self, qty: i64) -> StockResult<()> {
        if qty > self.reserved_qty {
            return Err(StockError::InsufficientReservedStock {
                product_id: self.product_id.clone(),
                reserved: self.reserved_qty,
                requested: qty,
            });
        }
        Ok(())
    }

    fn checked(&self, value: Option<i64>, requested: i64) -> StockResult<i64> {
        value.ok_or_else(|| StockError::QuantityOverflow {
            product_id: self.product_id.clone(),
            requested,
        })
    }

    fn recompute_total(&mut self) {
        self.total_qty = self.available_qty + self.reserved_qty;
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        self.last_movement_at = Some(now);
    }
}

// =============================================================================
// Stock Operation
// =============================================================================

/// The canonical quantity operations, as a value.
///
/// Lets the coordinator run one load/validate/persist/append path for every
/// operation, single or batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StockOperation {
    Add,
    Remove,
    Reserve,
    Release,
    Confirm,
}

impl StockOperation {
    /// Applies this operation to `record`.
    pub fn apply(&self, record: &mut StockRecord, qty: i64) -> StockResult<()> {
        match self {
            StockOperation::Add => record.add_stock(qty),
            StockOperation::Remove => record.remove_stock(qty),
            StockOperation::Reserve => record.reserve_stock(qty),
            StockOperation::Release => record.release_reserved_stock(qty),
            StockOperation::Confirm => record.confirm_reserved_stock(qty),
        }
    }

    /// Direction recorded on the movement.
    pub fn movement_type(&self) -> MovementType {
        match self {
            StockOperation::Add => MovementType::In,
            StockOperation::Remove | StockOperation::Confirm => MovementType::Out,
            StockOperation::Reserve => MovementType::Reserved,
            StockOperation::Release => MovementType::Released,
        }
    }

    /// Reason recorded when the caller does not choose one.
    pub fn default_reason(&self) -> MovementReason {
        match self {
            StockOperation::Add | StockOperation::Remove => MovementReason::Adjustment,
            StockOperation::Reserve => MovementReason::Reservation,
            StockOperation::Release => MovementReason::Release,
            StockOperation::Confirm => MovementReason::Sale,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StockOperation::Add => "add_stock",
            StockOperation::Remove => "remove_stock",
            StockOperation::Reserve => "reserve_stock",
            StockOperation::Release => "release_reserved_stock",
            StockOperation::Confirm => "confirm_reserved_stock",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
