//! # Movement Repository
//!
//! The append-only audit log.
//!
//! ## Access Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  write   append / append_all     inside the coordinator's transaction   │
//! │                                                                         │
//! │  read    list_by_product         newest first, paged                    │
//! │          list_by_reference       oldest first (one sale's trail)        │
//! │          search / count          type + reason + date range, paged      │
//! │          summarize               count + quantity per (type, reason)    │
//! │          history                 oldest first, for ledger replay        │
//! │                                                                         │
//! │  never   UPDATE / DELETE         rejected by triggers in the schema     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "Newest" and "oldest" follow the `seq` column (insertion order), not the
//! timestamp, so rows written in the same instant still have a stable order.

use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::{MovementFilter, MovementSummary, Page, StockMovement};

const MOVEMENT_COLUMNS: &str =
    "id, product_id, movement_type, reason, quantity, reference, notes, created_at, created_by";

/// Repository for stock movements.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Movements of one product, newest first.
    pub async fn list_by_product(
        &self,
        product_id: &str,
        page: Page,
    ) -> DbResult<Vec<StockMovement>> {
        debug!(product_id = %product_id, limit = page.limit, offset = page.offset, "Listing movements");

        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = ?1 ORDER BY seq DESC LIMIT ?2 OFFSET ?3"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(product_id)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Every movement carrying `reference`, oldest first.
    ///
    /// ## Example
    /// ```rust,ignore
    /// // Everything a sale did to stock, across products
    /// let trail = db.movements().list_by_reference("sale-42").await?;
    /// ```
    pub async fn list_by_reference(&self, reference: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE reference = ?1 ORDER BY seq"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(reference)
            .fetch_all(&self.pool)
            .await?;

        debug!(reference = %reference, count = movements.len(), "Reference lookup");
        Ok(movements)
    }

    /// Movements matching a reporting filter, newest first.
    pub async fn search(
        &self,
        filter: &MovementFilter,
        page: Page,
    ) -> DbResult<Vec<StockMovement>> {
        debug!(?filter, limit = page.limit, offset = page.offset, "Searching movements");

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE 1 = 1"
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY seq DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.offset));

        let movements = qb
            .build_query_as::<StockMovement>()
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Counts movements matching a filter.
    pub async fn count(&self, filter: &MovementFilter) -> DbResult<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM stock_movements WHERE 1 = 1");
        push_filter(&mut qb, filter);

        let count: i64 = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Movement count and total quantity per (type, reason).
    ///
    /// ## Example
    /// ```text
    /// type      reason       count  quantity
    /// in        purchase        12       480
    /// out       sale            31        77
    /// out       damage           2         3
    /// reserved  reservation     35        90
    /// ```
    pub async fn summarize(&self, filter: &MovementFilter) -> DbResult<Vec<MovementSummary>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT movement_type, reason, COUNT(*) AS count, SUM(quantity) AS quantity \
             FROM stock_movements WHERE 1 = 1",
        );
        push_filter(&mut qb, filter);
        qb.push(" GROUP BY movement_type, reason ORDER BY movement_type, reason");

        let summary = qb
            .build_query_as::<MovementSummary>()
            .fetch_all(&self.pool)
            .await?;

        debug!(groups = summary.len(), "Movement summary computed");
        Ok(summary)
    }

    // -------------------------------------------------------------------------
    // Executor-generic building blocks
    // -------------------------------------------------------------------------

    /// Appends one movement.
    pub(crate) async fn append<'e, E>(executor: E, movement: &StockMovement) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, movement_type, reason, quantity,
                reference, notes, created_at, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.reason)
        .bind(movement.quantity)
        .bind(&movement.reference)
        .bind(&movement.notes)
        .bind(movement.created_at)
        .bind(&movement.created_by)
        .execute(executor)
        .await?;

        debug!(
            id = %movement.id,
            product_id = %movement.product_id,
            movement_type = %movement.movement_type,
            quantity = movement.quantity,
            "Movement appended"
        );
        Ok(())
    }

    /// Appends many movements in order on one connection.
    pub(crate) async fn append_all(
        conn: &mut SqliteConnection,
        movements: &[StockMovement],
    ) -> DbResult<()> {
        for movement in movements {
            Self::append(&mut *conn, movement).await?;
        }
        Ok(())
    }

    /// Full history of a product, oldest first, optionally cut at `until`
    /// (inclusive).
    pub(crate) async fn history<'e, E>(
        executor: E,
        product_id: &str,
        until: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<StockMovement>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = "
        ));
        qb.push_bind(product_id.to_string());
        if let Some(until) = until {
            qb.push(" AND created_at <= ").push_bind(until);
        }
        qb.push(" ORDER BY seq");

        let movements = qb
            .build_query_as::<StockMovement>()
            .fetch_all(executor)
            .await?;

        Ok(movements)
    }
}

// =============================================================================
// Filter SQL
// =============================================================================

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &MovementFilter) {
    if let Some(product_id) = &filter.product_id {
        qb.push(" AND product_id = ").push_bind(product_id.clone());
    }
    if let Some(movement_type) = filter.movement_type {
        qb.push(" AND movement_type = ").push_bind(movement_type);
    }
    if let Some(reason) = filter.reason {
        qb.push(" AND reason = ").push_bind(reason);
    }
    if let Some(reference) = &filter.reference {
        qb.push(" AND reference = ").push_bind(reference.clone());
    }
    if let Some(from) = filter.from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND created_at < ").push_bind(to);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use tally_core::{MovementReason, MovementType, OperationContext};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn movement(
        product_id: &str,
        t: MovementType,
        r: MovementReason,
        q: i64,
        reference: Option<&str>,
        at: DateTime<Utc>,
    ) -> StockMovement {
        let mut ctx = OperationContext::new("tester");
        if let Some(reference) = reference {
            ctx = ctx.with_reference(reference);
        }
        StockMovement::new(product_id, t, r, q, &ctx, at).unwrap()
    }

    #[tokio::test]
    async fn test_append_and_list_newest_first() {
        let db = setup().await;
        let now = Utc::now();
        let log = vec![
            movement("p-1", MovementType::In, MovementReason::Purchase, 10, None, now),
            movement("p-1", MovementType::Reserved, MovementReason::Reservation, 4, Some("sale-1"), now),
            movement("p-1", MovementType::Out, MovementReason::Sale, 4, Some("sale-1"), now),
        ];

        let mut conn = db.pool().acquire().await.unwrap();
        MovementRepository::append_all(&mut conn, &log).await.unwrap();
        drop(conn);

        let listed = db.movements().list_by_product("p-1", Page::default()).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![log[2].id.clone(), log[1].id.clone(), log[0].id.clone()]);
        assert_eq!(listed[0], log[2]);

        let paged = db.movements().list_by_product("p-1", Page::new(1, 1)).await.unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, log[1].id);
    }

    #[tokio::test]
    async fn test_list_by_reference_spans_products() {
        let db = setup().await;
        let now = Utc::now();
        for m in [
            movement("p-1", MovementType::Reserved, MovementReason::Reservation, 1, Some("sale-9"), now),
            movement("p-2", MovementType::Reserved, MovementReason::Reservation, 2, Some("sale-9"), now),
            movement("p-2", MovementType::In, MovementReason::Purchase, 5, Some("po-1"), now),
        ] {
            MovementRepository::append(db.pool(), &m).await.unwrap();
        }

        let trail = db.movements().list_by_reference("sale-9").await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].product_id, "p-1");
        assert_eq!(trail[1].product_id, "p-2");
        assert!(db.movements().list_by_reference("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_summarize_and_count() {
        let db = setup().await;
        let t0 = Utc::now() - Duration::days(2);
        let t1 = Utc::now() - Duration::days(1);
        for m in [
            movement("p-1", MovementType::In, MovementReason::Purchase, 10, None, t0),
            movement("p-1", MovementType::Out, MovementReason::Damage, 1, None, t1),
            movement("p-2", MovementType::In, MovementReason::Purchase, 7, None, t1),
            movement("p-2", MovementType::Out, MovementReason::Expiry, 2, None, t1),
        ] {
            MovementRepository::append(db.pool(), &m).await.unwrap();
        }
        let repo = db.movements();

        let inbound = MovementFilter::default().of_type(MovementType::In);
        assert_eq!(repo.count(&inbound).await.unwrap(), 2);

        let recent = MovementFilter::default().between(t1, Utc::now());
        let found = repo.search(&recent, Page::default()).await.unwrap();
        assert_eq!(found.len(), 3);

        // Upper bound is exclusive.
        let before_t1 = MovementFilter::default().between(t0, t1);
        assert_eq!(repo.count(&before_t1).await.unwrap(), 1);

        let damage = MovementFilter::default()
            .product("p-1")
            .reason(MovementReason::Damage);
        assert_eq!(repo.search(&damage, Page::default()).await.unwrap().len(), 1);

        let summary = repo.summarize(&MovementFilter::default()).await.unwrap();
        let purchase = summary
            .iter()
            .find(|s| s.reason == MovementReason::Purchase)
            .unwrap();
        assert_eq!(purchase.movement_type, MovementType::In);
        assert_eq!(purchase.count, 2);
        assert_eq!(purchase.quantity, 17);
        assert_eq!(summary.len(), 3);
    }

    #[tokio::test]
    async fn test_history_is_oldest_first_and_cut_at_instant() {
        let db = setup().await;
        let t0 = Utc::now() - Duration::hours(2);
        let first = movement("p-1", MovementType::In, MovementReason::Purchase, 3, None, t0);
        let second = movement(
            "p-1",
            MovementType::In,
            MovementReason::Return,
            1,
            None,
            t0 + Duration::hours(1),
        );
        MovementRepository::append(db.pool(), &first).await.unwrap();
        MovementRepository::append(db.pool(), &second).await.unwrap();

        let all = MovementRepository::history(db.pool(), "p-1", None).await.unwrap();
        assert_eq!(all, vec![first.clone(), second]);

        let cut = MovementRepository::history(db.pool(), "p-1", Some(t0 + Duration::minutes(30)))
            .await
            .unwrap();
        assert_eq!(cut, vec![first]);
    }

    #[tokio::test]
    async fn test_movements_are_append_only() {
        let db = setup().await;
        let m = movement("p-1", MovementType::In, MovementReason::Purchase, 3, None, Utc::now());
        MovementRepository::append(db.pool(), &m).await.unwrap();

        let update = sqlx::query("UPDATE stock_movements SET quantity = 99 WHERE id = ?1")
            .bind(&m.id)
            .execute(db.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM stock_movements WHERE id = ?1")
            .bind(&m.id)
            .execute(db.pool())
            .await;
        assert!(delete.is_err());

        assert_eq!(db.movements().count(&MovementFilter::default()).await.unwrap(), 1);
    }
}
