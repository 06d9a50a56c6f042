//! # Bulk Operations
//!
//! Multi-line reserve / release / confirm with all-or-nothing semantics.
//!
//! ```text
//! reserve_batch([p1×5, p2×5, p3×1000])        available: p1=10 p2=10 p3=1
//!
//!   validate every line        (shape, quantity)         ── before BEGIN
//!   BEGIN IMMEDIATE
//!     line 0  p1  10 → 5   ✓   staged
//!     line 1  p2  10 → 5   ✓   staged
//!     line 2  p3   1 < 1000 ✗  InsufficientStock
//!   ROLLBACK                   p1, p2 untouched, no movements
//!
//!   Err(BatchLine { index: 2, product_id: "p3", source: InsufficientStock })
//! ```
//!
//! Lines run in the order given, so the reported failing line is
//! deterministic. Movements are appended after the last line is staged, in
//! line order, inside the same transaction.

use tracing::{info, warn};

use super::{stage, InventoryError, InventoryResult, InventoryService, Mutation, StockChange};
use crate::pool::begin_write;
use crate::repository::MovementRepository;
use tally_core::validation::{validate_batch_size, validate_context};
use tally_core::{BatchLine, OperationContext, StockMovement, StockOperation};

impl InventoryService {
    /// Reserves stock for every line of a sale, or for none.
    pub async fn reserve_batch(
        &self,
        lines: &[BatchLine],
        ctx: &OperationContext,
    ) -> InventoryResult<Vec<StockChange>> {
        self.run_batch(StockOperation::Reserve, lines, ctx).await
    }

    /// Releases reservations for every line of a cancelled sale, or for none.
    pub async fn release_batch(
        &self,
        lines: &[BatchLine],
        ctx: &OperationContext,
    ) -> InventoryResult<Vec<StockChange>> {
        self.run_batch(StockOperation::Release, lines, ctx).await
    }

    /// Confirms reservations for every line of a completed sale, or for none.
    pub async fn confirm_batch(
        &self,
        lines: &[BatchLine],
        ctx: &OperationContext,
    ) -> InventoryResult<Vec<StockChange>> {
        self.run_batch(StockOperation::Confirm, lines, ctx).await
    }

    async fn run_batch(
        &self,
        operation: StockOperation,
        lines: &[BatchLine],
        ctx: &OperationContext,
    ) -> InventoryResult<Vec<StockChange>> {
        let result = self.try_run_batch(operation, lines, ctx).await;

        match &result {
            Ok(changes) => info!(
                operation = operation.name(),
                lines = changes.len(),
                reference = ?ctx.reference,
                actor = %ctx.actor,
                "Inventory batch committed"
            ),
            Err(err) => warn!(
                operation = operation.name(),
                lines = lines.len(),
                failed_line = ?err.failed_line(),
                kind = %err.kind(),
                error = %err,
                "Inventory batch rolled back"
            ),
        }
        result
    }

    async fn try_run_batch(
        &self,
        operation: StockOperation,
        lines: &[BatchLine],
        ctx: &OperationContext,
    ) -> InventoryResult<Vec<StockChange>> {
        validate_batch_size(lines.len(), self.max_batch_lines)?;
        validate_context(ctx)?;

        let mutations: Vec<Mutation<'_>> = lines
            .iter()
            .map(|line| Mutation::new(&line.product_id, operation, line.quantity))
            .collect();

        for (index, mutation) in mutations.iter().enumerate() {
            mutation
                .validate()
                .map_err(|e| e.at_line(index, mutation.product_id))?;
        }

        let mut tx = begin_write(&self.pool).await?;

        let mut changes = Vec::with_capacity(mutations.len());
        for (index, mutation) in mutations.iter().enumerate() {
            let change = stage(&mut *tx, *mutation, ctx)
                .await
                .map_err(|e| e.at_line(index, mutation.product_id))?;
            changes.push(change);
        }

        let movements: Vec<StockMovement> = changes.iter().map(|c| c.movement.clone()).collect();
        MovementRepository::append_all(&mut *tx, &movements).await?;

        tx.commit().await?;
        Ok(changes)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::tests::{ctx, movement_count, setup};
    use super::*;
    use tally_core::{ErrorKind, MovementType, StockError};

    fn lines(items: &[(&str, i64)]) -> Vec<BatchLine> {
        items.iter().map(|(p, q)| BatchLine::new(*p, *q)).collect()
    }

    #[tokio::test]
    async fn test_reserve_batch_commits_every_line() {
        let (db, inventory) = setup().await;
        for p in ["p-1", "p-2", "p-3"] {
            inventory.provision(p, 10, 0, &ctx()).await.unwrap();
        }

        let changes = inventory
            .reserve_batch(&lines(&[("p-1", 1), ("p-2", 2), ("p-3", 3)]), &ctx())
            .await
            .unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[2].record.reserved_qty(), 3);

        let trail = db.movements().list_by_reference("sale-1").await.unwrap();
        let reserved: Vec<_> = trail
            .iter()
            .filter(|m| m.movement_type == MovementType::Reserved)
            .map(|m| (m.product_id.as_str(), m.quantity))
            .collect();
        assert_eq!(reserved, vec![("p-1", 1), ("p-2", 2), ("p-3", 3)]);
    }

    #[tokio::test]
    async fn test_failing_line_rolls_back_whole_batch() {
        let (db, inventory) = setup().await;
        inventory.provision("p-1", 10, 0, &ctx()).await.unwrap();
        inventory.provision("p-2", 10, 0, &ctx()).await.unwrap();
        inventory.provision("p-3", 1, 0, &ctx()).await.unwrap();

        let err = inventory
            .reserve_batch(&lines(&[("p-1", 5), ("p-2", 5), ("p-3", 1000)]), &ctx())
            .await
            .unwrap_err();

        assert_eq!(err.failed_line(), Some(2));
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        match err {
            InventoryError::BatchLine { product_id, source, .. } => {
                assert_eq!(product_id, "p-3");
                assert!(matches!(
                    *source,
                    InventoryError::Stock(StockError::InsufficientStock {
                        available: 1,
                        requested: 1000,
                        ..
                    })
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        for (p, available) in [("p-1", 10), ("p-2", 10), ("p-3", 1)] {
            let stock = inventory.get_stock(p).await.unwrap();
            assert_eq!(stock.available_qty(), available);
            assert_eq!(stock.reserved_qty(), 0);
            assert_eq!(stock.version(), 0);
            assert_eq!(movement_count(&db, p).await, 1);
        }
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back() {
        let (db, inventory) = setup().await;
        inventory.provision("p-1", 10, 0, &ctx()).await.unwrap();

        let err = inventory
            .reserve_batch(&lines(&[("p-1", 1), ("ghost", 1)]), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.failed_line(), Some(1));
        assert_eq!(movement_count(&db, "p-1").await, 1);
    }

    #[tokio::test]
    async fn test_invalid_lines_rejected_before_any_write() {
        let (db, inventory) = setup().await;
        inventory.provision("p-1", 10, 0, &ctx()).await.unwrap();

        let err = inventory
            .reserve_batch(&lines(&[("p-1", 1), ("p-1", 0)]), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidQuantity);
        assert_eq!(err.failed_line(), Some(1));

        let err = inventory.reserve_batch(&[], &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let limited = inventory.clone().with_max_batch_lines(2);
        let err = limited
            .reserve_batch(&lines(&[("p-1", 1), ("p-1", 1), ("p-1", 1)]), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.failed_line(), None);

        assert_eq!(movement_count(&db, "p-1").await, 1);
    }

    #[tokio::test]
    async fn test_release_and_confirm_batches() {
        let (db, inventory) = setup().await;
        inventory.provision("p-1", 10, 0, &ctx()).await.unwrap();
        inventory.provision("p-2", 10, 0, &ctx()).await.unwrap();
        let sale = lines(&[("p-1", 4), ("p-2", 6)]);

        inventory.reserve_batch(&sale, &ctx()).await.unwrap();
        let confirmed = inventory.confirm_batch(&sale, &ctx()).await.unwrap();
        assert_eq!(confirmed[0].record.total_qty(), 6);
        assert_eq!(confirmed[1].record.total_qty(), 4);

        // Nothing left reserved: releasing fails and changes nothing.
        let err = inventory.release_batch(&sale, &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientReservedStock);
        assert_eq!(err.failed_line(), Some(0));

        inventory.reserve_batch(&sale, &ctx()).await.unwrap();
        let released = inventory.release_batch(&sale, &ctx()).await.unwrap();
        assert_eq!(released[1].record.available_qty(), 4);
        assert_eq!(released[1].record.reserved_qty(), 0);

        assert!(inventory.reconcile("p-1").await.unwrap().in_sync);
        assert_eq!(movement_count(&db, "p-2").await, 5);
    }

    #[tokio::test]
    async fn test_same_product_twice_in_one_batch() {
        let (_db, inventory) = setup().await;
        inventory.provision("p-1", 10, 0, &ctx()).await.unwrap();

        let changes = inventory
            .reserve_batch(&lines(&[("p-1", 4), ("p-1", 5)]), &ctx())
            .await
            .unwrap();
        assert_eq!(changes[1].record.available_qty(), 1);
        assert_eq!(changes[1].record.version(), 2);

        let err = inventory
            .reserve_batch(&lines(&[("p-1", 1), ("p-1", 1)]), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.failed_line(), Some(1));
        assert_eq!(inventory.get_stock("p-1").await.unwrap().available_qty(), 1);
    }
}
