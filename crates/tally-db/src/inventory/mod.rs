//! # Inventory Operation Coordinator
//!
//! One entry point per business operation; each owns its transaction.
//!
//! ## Single Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reserve_stock("p-1", 3, ctx)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate quantity + ctx          ── fail ──► error, nothing written    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE                  (writers queue on busy_timeout)       │
//! │  load stock record                ── none ──► NotFound   (ROLLBACK)     │
//! │  StockRecord::reserve_stock(3)    ── fail ──► domain err (ROLLBACK)     │
//! │  UPDATE ... WHERE version = v     ── 0 rows ► Conflict   (ROLLBACK)     │
//! │  INSERT movement (reserved, 3)                                          │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StockChange { record, movement }                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A transaction dropped without `commit()` rolls back, so every early
//! return above leaves the store untouched.
//!
//! Bulk variants live in [`bulk`].

pub mod bulk;
pub mod error;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::DbError;
use crate::pool::begin_write;
use crate::repository::{MovementRepository, StockRepository};
use tally_core::validation::{
    validate_batch_size, validate_context, validate_product_id, validate_quantity,
    validate_search_query,
};
use tally_core::{
    MovementReason, MovementType, OperationContext, Page, QuantitySnapshot, ReconciliationReport,
    StockError, StockFilter, StockListing, StockMovement, StockOperation, StockRecord,
    INITIAL_STOCK_REFERENCE, MAX_BATCH_LINES,
};

pub use error::{ErrorResponse, InventoryError, InventoryResult};

/// Outcome of one committed quantity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    /// The record as persisted (new version).
    pub record: StockRecord,
    /// The movement appended in the same transaction.
    pub movement: StockMovement,
}

/// One requested counter change, before it touches the store.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mutation<'a> {
    pub product_id: &'a str,
    pub operation: StockOperation,
    pub quantity: i64,
    pub reason: MovementReason,
}

impl<'a> Mutation<'a> {
    pub(crate) fn new(product_id: &'a str, operation: StockOperation, quantity: i64) -> Self {
        Mutation {
            product_id,
            operation,
            quantity,
            reason: operation.default_reason(),
        }
    }

    fn with_reason(mut self, reason: MovementReason) -> Self {
        self.reason = reason;
        self
    }

    pub(crate) fn validate(&self) -> InventoryResult<()> {
        validate_product_id(self.product_id)?;
        validate_quantity(self.quantity)?;
        Ok(())
    }
}

/// Coordinates stock record writes with their movement records.
///
/// ## Usage
/// ```rust,ignore
/// let inventory = db.inventory();
/// let ctx = OperationContext::new("cashier-1").with_reference("sale-42");
///
/// inventory.reserve_stock("p-1", 2, &ctx).await?;   // item added to sale
/// inventory.confirm_reserved_stock("p-1", 2, &ctx).await?; // sale completed
/// ```
#[derive(Debug, Clone)]
pub struct InventoryService {
    pool: SqlitePool,
    max_batch_lines: usize,
}

impl InventoryService {
    /// Creates a coordinator over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryService {
            pool,
            max_batch_lines: MAX_BATCH_LINES,
        }
    }

    /// Overrides the maximum number of lines in one bulk request.
    pub fn with_max_batch_lines(mut self, max: usize) -> Self {
        self.max_batch_lines = max;
        self
    }

    pub fn max_batch_lines(&self) -> usize {
        self.max_batch_lines
    }

    // =========================================================================
    // Provisioning
    // =========================================================================

    /// Creates the stock record for a newly tracked product.
    ///
    /// A positive `initial_qty` is recorded as an `in`/`adjustment` movement
    /// referenced `initial-stock`, written in the same transaction, so the
    /// log replays to the starting quantity. A zero start writes no movement.
    ///
    /// ## Errors
    /// * `AlreadyExists` - the product already has a stock record
    /// * `InvalidQuantity` - negative `initial_qty`
    pub async fn provision(
        &self,
        product_id: &str,
        initial_qty: i64,
        reorder_level: i64,
        ctx: &OperationContext,
    ) -> InventoryResult<StockRecord> {
        let result = self
            .try_provision(product_id, initial_qty, reorder_level, ctx)
            .await;

        match &result {
            Ok(record) => info!(
                product_id = %product_id,
                stock_id = %record.id(),
                initial_qty,
                reorder_level,
                actor = %ctx.actor,
                "Stock record provisioned"
            ),
            Err(err) => warn!(
                product_id = %product_id,
                initial_qty,
                kind = %err.kind(),
                error = %err,
                "Provisioning rejected"
            ),
        }
        result
    }

    async fn try_provision(
        &self,
        product_id: &str,
        initial_qty: i64,
        reorder_level: i64,
        ctx: &OperationContext,
    ) -> InventoryResult<StockRecord> {
        validate_product_id(product_id)?;
        validate_context(ctx)?;
        let record = StockRecord::new(product_id, initial_qty, reorder_level)?;

        let mut tx = begin_write(&self.pool).await?;

        if StockRepository::find_by_product(&mut *tx, product_id)
            .await?
            .is_some()
        {
            return Err(InventoryError::AlreadyExists(product_id.to_string()));
        }

        StockRepository::insert(&mut *tx, &record)
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => {
                    InventoryError::AlreadyExists(product_id.to_string())
                }
                other => other.into(),
            })?;

        if initial_qty > 0 {
            let initial = ctx.clone().with_reference(INITIAL_STOCK_REFERENCE);
            let movement = StockMovement::new(
                product_id,
                MovementType::In,
                MovementReason::Adjustment,
                initial_qty,
                &initial,
                record.created_at(),
            )?;
            MovementRepository::append(&mut *tx, &movement).await?;
        }

        tx.commit().await?;
        Ok(record)
    }

    // =========================================================================
    // Single-Product Operations
    // =========================================================================

    /// Applies a signed manual adjustment.
    ///
    /// Positive quantities go through `add_stock`, negative ones through
    /// `remove_stock`.
    ///
    /// ## Reason Policy
    /// ```text
    /// qty > 0   purchase | return | adjustment
    /// qty < 0   damage   | expiry | adjustment
    /// never     sale | reservation | release   (use reserve → confirm)
    /// ```
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        signed_qty: i64,
        reason: MovementReason,
        ctx: &OperationContext,
    ) -> InventoryResult<StockChange> {
        if signed_qty == 0 {
            let err: InventoryError = StockError::InvalidQuantity { requested: 0 }.into();
            warn!(product_id = %product_id, kind = %err.kind(), "Adjustment rejected");
            return Err(err);
        }

        let quantity = signed_qty.checked_abs().ok_or(StockError::QuantityOverflow {
            product_id: product_id.to_string(),
            requested: signed_qty,
        })?;
        let operation = if signed_qty > 0 {
            StockOperation::Add
        } else {
            StockOperation::Remove
        };

        if let Err(err) = reason.check_adjustment(signed_qty) {
            warn!(product_id = %product_id, reason = %reason, signed_qty, "Adjustment reason rejected");
            return Err(err.into());
        }

        let mutation = Mutation::new(product_id, operation, quantity).with_reason(reason);
        self.run(mutation, ctx).await
    }

    /// Moves `qty` from available to reserved (item added to a sale).
    pub async fn reserve_stock(
        &self,
        product_id: &str,
        qty: i64,
        ctx: &OperationContext,
    ) -> InventoryResult<StockChange> {
        self.run(Mutation::new(product_id, StockOperation::Reserve, qty), ctx)
            .await
    }

    /// Moves `qty` from reserved back to available (sale cancelled).
    pub async fn release_reserved_stock(
        &self,
        product_id: &str,
        qty: i64,
        ctx: &OperationContext,
    ) -> InventoryResult<StockChange> {
        self.run(Mutation::new(product_id, StockOperation::Release, qty), ctx)
            .await
    }

    /// Deducts `qty` of reserved stock permanently (sale completed).
    ///
    /// Recorded as an `out` movement with reason `sale`.
    pub async fn confirm_reserved_stock(
        &self,
        product_id: &str,
        qty: i64,
        ctx: &OperationContext,
    ) -> InventoryResult<StockChange> {
        self.run(Mutation::new(product_id, StockOperation::Confirm, qty), ctx)
            .await
    }

    async fn run(
        &self,
        mutation: Mutation<'_>,
        ctx: &OperationContext,
    ) -> InventoryResult<StockChange> {
        let result = self.try_run(mutation, ctx).await;

        match &result {
            Ok(change) => info!(
                product_id = %mutation.product_id,
                operation = mutation.operation.name(),
                movement_type = %change.movement.movement_type,
                reason = %change.movement.reason,
                quantity = mutation.quantity,
                reference = ?ctx.reference,
                actor = %ctx.actor,
                available = change.record.available_qty(),
                reserved = change.record.reserved_qty(),
                total = change.record.total_qty(),
                "Inventory operation committed"
            ),
            Err(err) => warn!(
                product_id = %mutation.product_id,
                operation = mutation.operation.name(),
                quantity = mutation.quantity,
                kind = %err.kind(),
                error = %err,
                "Inventory operation rejected"
            ),
        }
        result
    }

    async fn try_run(
        &self,
        mutation: Mutation<'_>,
        ctx: &OperationContext,
    ) -> InventoryResult<StockChange> {
        mutation.validate()?;
        validate_context(ctx)?;

        let mut tx = begin_write(&self.pool).await?;
        let change = stage(&mut *tx, mutation, ctx).await?;
        MovementRepository::append(&mut *tx, &change.movement).await?;
        tx.commit().await?;

        Ok(change)
    }

    // =========================================================================
    // Reorder Levels
    // =========================================================================

    /// Sets the low-stock threshold of one product. No movement is written.
    pub async fn set_reorder_level(
        &self,
        product_id: &str,
        reorder_level: i64,
    ) -> InventoryResult<StockRecord> {
        validate_product_id(product_id)?;

        let mut record = self.get_stock(product_id).await?;
        record.set_reorder_level(reorder_level)?;
        let saved = StockRepository::update(&self.pool, &record).await?;

        info!(product_id = %product_id, reorder_level, "Reorder level updated");
        Ok(saved)
    }

    /// Sets many thresholds in one transaction; all or none are applied.
    ///
    /// A product listed twice takes its last level.
    pub async fn set_reorder_levels(
        &self,
        levels: &[(String, i64)],
    ) -> InventoryResult<Vec<StockRecord>> {
        validate_batch_size(levels.len(), self.max_batch_lines)?;

        let mut records: Vec<StockRecord> = Vec::with_capacity(levels.len());
        for (index, (product_id, level)) in levels.iter().enumerate() {
            let apply = async {
                validate_product_id(product_id)?;
                match records.iter_mut().find(|r| r.product_id() == product_id.as_str()) {
                    Some(record) => record.set_reorder_level(*level)?,
                    None => {
                        let mut record = self.get_stock(product_id).await?;
                        record.set_reorder_level(*level)?;
                        records.push(record);
                    }
                }
                Ok::<_, InventoryError>(())
            };
            apply.await.map_err(|e| e.at_line(index, product_id))?;
        }

        let saved = StockRepository::new(self.pool.clone())
            .update_batch(&records)
            .await?;

        info!(count = saved.len(), "Reorder levels updated");
        Ok(saved)
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Replays a product's movement log and compares it with the stored
    /// record. Both are read from one snapshot.
    ///
    /// A log that cannot be replayed comes back as an out-of-sync report,
    /// not an error.
    pub async fn reconcile(&self, product_id: &str) -> InventoryResult<ReconciliationReport> {
        validate_product_id(product_id)?;

        let mut tx = self.pool.begin().await?;
        let record = StockRepository::find_by_product(&mut *tx, product_id)
            .await?
            .ok_or_else(|| InventoryError::NotFound(product_id.to_string()))?;
        let movements = MovementRepository::history(&mut *tx, product_id, None).await?;
        tx.commit().await?;

        let report = ReconciliationReport::build(&record, &movements);

        if report.in_sync {
            info!(
                product_id = %product_id,
                movements = report.movement_count,
                "Stock record reconciles with movement log"
            );
        } else if let Some(failure) = &report.replay_failure {
            warn!(
                product_id = %product_id,
                failure = %failure,
                "Movement log cannot be replayed"
            );
        } else {
            let (available_drift, reserved_drift) = report.drift();
            warn!(
                product_id = %product_id,
                available_drift,
                reserved_drift,
                "Stock record drifted from movement log"
            );
        }
        Ok(report)
    }

    /// Reconstructs a product's quantities as of `at` from its log.
    ///
    /// Works for products whose stock record was hard-deleted, as long as
    /// they have history.
    pub async fn quantity_at(
        &self,
        product_id: &str,
        at: DateTime<Utc>,
    ) -> InventoryResult<QuantitySnapshot> {
        validate_product_id(product_id)?;

        let mut tx = self.pool.begin().await?;
        let tracked = StockRepository::find_by_product(&mut *tx, product_id)
            .await?
            .is_some();
        let movements = MovementRepository::history(&mut *tx, product_id, Some(at)).await?;
        tx.commit().await?;

        if !tracked && movements.is_empty() {
            return Err(InventoryError::NotFound(product_id.to_string()));
        }

        Ok(QuantitySnapshot::at(product_id, at, &movements)?)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current stock record of a product.
    pub async fn get_stock(&self, product_id: &str) -> InventoryResult<StockRecord> {
        StockRepository::find_by_product(&self.pool, product_id)
            .await?
            .ok_or_else(|| InventoryError::NotFound(product_id.to_string()))
    }

    /// Stock listing with the search text validated.
    pub async fn list_stock(
        &self,
        filter: &StockFilter,
        page: Page,
    ) -> InventoryResult<Vec<StockListing>> {
        let filter = normalize_filter(filter)?;
        Ok(StockRepository::new(self.pool.clone())
            .list(&filter, page)
            .await?)
    }

    /// Number of records matching a listing filter.
    pub async fn count_stock(&self, filter: &StockFilter) -> InventoryResult<i64> {
        let filter = normalize_filter(filter)?;
        Ok(StockRepository::new(self.pool.clone()).count(&filter).await?)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Deletes a product's stock record. The movement history is kept.
    pub async fn hard_delete(&self, product_id: &str) -> InventoryResult<()> {
        validate_product_id(product_id)?;

        StockRepository::new(self.pool.clone())
            .hard_delete(product_id)
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => InventoryError::NotFound(product_id.to_string()),
                other => other.into(),
            })?;

        warn!(product_id = %product_id, "Stock record hard-deleted");
        Ok(())
    }
}

/// Load, mutate, check and persist one record on `conn`.
///
/// The returned movement is NOT yet appended; the caller appends it on the
/// same connection before committing.
pub(crate) async fn stage(
    conn: &mut SqliteConnection,
    mutation: Mutation<'_>,
    ctx: &OperationContext,
) -> InventoryResult<StockChange> {
    let mut record = StockRepository::find_by_product(&mut *conn, mutation.product_id)
        .await?
        .ok_or_else(|| InventoryError::NotFound(mutation.product_id.to_string()))?;

    mutation.operation.apply(&mut record, mutation.quantity)?;
    record.check_invariants()?;

    let movement = StockMovement::new(
        mutation.product_id,
        mutation.operation.movement_type(),
        mutation.reason,
        mutation.quantity,
        ctx,
        record.last_movement_at().unwrap_or_else(|| record.updated_at()),
    )?;

    let record = StockRepository::update(&mut *conn, &record).await?;
    Ok(StockChange { record, movement })
}

fn normalize_filter(filter: &StockFilter) -> InventoryResult<StockFilter> {
    let mut filter = filter.clone();
    if let Some(search) = filter.search.take() {
        let search = validate_search_query(&search)?;
        filter.search = (!search.is_empty()).then_some(search);
    }
    Ok(filter)
}

// =============================================================================
// Unit Tests
// =============================================================================
