//! # Stock Repository
//!
//! Persistence for per-product quantity counters.
//!
//! ## Optimistic Versioning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every write of a loaded record is conditional on its version:          │
//! │                                                                         │
//! │    UPDATE stock_records                                                 │
//! │       SET ..., version = version + 1                                    │
//! │     WHERE id = ? AND version = ?        ← version read at load time     │
//! │    RETURNING ...                                                        │
//! │                                                                         │
//! │  0 rows  → DbError::Conflict (someone else committed first)             │
//! │  1 row   → the freshly persisted record, new version                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The executor-generic functions (`find_by_product`, `insert`, `update`)
//! run on whatever the caller passes: the pool for plain reads, or a
//! transaction connection so the write commits together with its movement.

use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use tally_core::{Page, StockFilter, StockListing, StockRecord};

const STOCK_COLUMNS: &str = "id, product_id, available_qty, reserved_qty, total_qty, \
     reorder_level, last_movement_at, created_at, updated_at, version";

const LISTING_COLUMNS: &str = "s.id, s.product_id, s.available_qty, s.reserved_qty, \
     s.total_qty, s.reorder_level, s.last_movement_at, s.created_at, s.updated_at, s.version, \
     p.sku, p.name, p.tenant_id";

/// Repository for stock records.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Gets the stock record of a product.
    pub async fn get_by_product(&self, product_id: &str) -> DbResult<Option<StockRecord>> {
        Self::find_by_product(&self.pool, product_id).await
    }

    /// Gets a stock record by its own ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockRecord>> {
        let sql = format!("SELECT {STOCK_COLUMNS} FROM stock_records WHERE id = ?1");
        let record = sqlx::query_as::<_, StockRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Lists stock records joined with catalog fields.
    ///
    /// ## Ordering
    /// By product name, then product id (records whose catalog row is gone
    /// sort by product id).
    pub async fn list(&self, filter: &StockFilter, page: Page) -> DbResult<Vec<StockListing>> {
        debug!(
            low_stock = filter.low_stock,
            out_of_stock = filter.out_of_stock,
            search = ?filter.search,
            limit = page.limit,
            offset = page.offset,
            "Listing stock records"
        );

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {LISTING_COLUMNS} FROM stock_records s \
             LEFT JOIN products p ON p.id = s.product_id WHERE 1 = 1"
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY COALESCE(p.name, s.product_id), s.product_id LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.offset));

        let rows = qb
            .build_query_as::<StockListing>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Stock listing returned rows");
        Ok(rows)
    }

    /// Counts stock records matching a filter (ignores paging).
    pub async fn count(&self, filter: &StockFilter) -> DbResult<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM stock_records s \
             LEFT JOIN products p ON p.id = s.product_id WHERE 1 = 1",
        );
        push_filter(&mut qb, filter);

        let count: i64 = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Writes many loaded records in one transaction.
    ///
    /// Every record is version-checked; one conflict rolls back the lot.
    pub async fn update_batch(&self, records: &[StockRecord]) -> DbResult<Vec<StockRecord>> {
        let mut tx = begin_write(&self.pool).await?;
        let saved = Self::update_all(&mut *tx, records).await?;
        tx.commit().await?;

        debug!(count = saved.len(), "Stock records updated in batch");
        Ok(saved)
    }

    /// Deletes a stock record. Administrative only; movements are kept.
    pub async fn hard_delete(&self, product_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM stock_records WHERE product_id = ?1")
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockRecord", product_id));
        }

        debug!(product_id = %product_id, "Stock record hard-deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Executor-generic building blocks
    // -------------------------------------------------------------------------

    pub(crate) async fn find_by_product<'e, E>(
        executor: E,
        product_id: &str,
    ) -> DbResult<Option<StockRecord>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {STOCK_COLUMNS} FROM stock_records WHERE product_id = ?1");
        let record = sqlx::query_as::<_, StockRecord>(&sql)
            .bind(product_id)
            .fetch_optional(executor)
            .await?;

        Ok(record)
    }

    pub(crate) async fn insert<'e, E>(executor: E, record: &StockRecord) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(product_id = %record.product_id(), "Inserting stock record");

        sqlx::query(
            r#"
            INSERT INTO stock_records (
                id, product_id, available_qty, reserved_qty, total_qty,
                reorder_level, last_movement_at, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(record.id())
        .bind(record.product_id())
        .bind(record.available_qty())
        .bind(record.reserved_qty())
        .bind(record.total_qty())
        .bind(record.reorder_level())
        .bind(record.last_movement_at())
        .bind(record.created_at())
        .bind(record.updated_at())
        .bind(record.version())
        .execute(executor)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: record.product_id().to_string(),
            },
            other => other,
        })?;

        Ok(())
    }

    /// Persists a loaded record if nobody wrote it since it was read.
    ///
    /// ## Returns
    /// The stored row with its bumped version.
    ///
    /// ## Errors
    /// * `DbError::Conflict` - the row's version moved on (or the row is gone)
    pub(crate) async fn update<'e, E>(executor: E, record: &StockRecord) -> DbResult<StockRecord>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "UPDATE stock_records SET \
                 available_qty = ?1, reserved_qty = ?2, total_qty = ?3, reorder_level = ?4, \
                 last_movement_at = ?5, updated_at = ?6, version = version + 1 \
             WHERE id = ?7 AND version = ?8 \
             RETURNING {STOCK_COLUMNS}"
        );

        let saved = sqlx::query_as::<_, StockRecord>(&sql)
            .bind(record.available_qty())
            .bind(record.reserved_qty())
            .bind(record.total_qty())
            .bind(record.reorder_level())
            .bind(record.last_movement_at())
            .bind(record.updated_at())
            .bind(record.id())
            .bind(record.version())
            .fetch_optional(executor)
            .await?;

        match saved {
            Some(saved) => {
                debug!(
                    product_id = %saved.product_id(),
                    version = saved.version(),
                    "Stock record updated"
                );
                Ok(saved)
            }
            None => Err(DbError::conflict("StockRecord", record.product_id())),
        }
    }

    pub(crate) async fn update_all(
        conn: &mut SqliteConnection,
        records: &[StockRecord],
    ) -> DbResult<Vec<StockRecord>> {
        let mut saved = Vec::with_capacity(records.len());
        for record in records {
            saved.push(Self::update(&mut *conn, record).await?);
        }
        Ok(saved)
    }
}

// =============================================================================
// Filter SQL
// =============================================================================

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &StockFilter) {
    if let Some(tenant_id) = &filter.tenant_id {
        qb.push(" AND p.tenant_id = ").push_bind(tenant_id.clone());
    }
    if filter.low_stock {
        qb.push(" AND s.available_qty <= s.reorder_level");
    }
    if filter.out_of_stock {
        qb.push(" AND s.available_qty = 0");
    }
    if let Some(search) = filter.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            let pattern = like_pattern(search);
            qb.push(" AND (p.sku LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR p.name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR p.barcode LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR s.product_id LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
    }
}

/// `%term%` with LIKE wildcards in `term` escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed(db: &Database, product_id: &str, qty: i64, reorder: i64) -> StockRecord {
        let record = StockRecord::new(product_id, qty, reorder).unwrap();
        StockRepository::insert(db.pool(), &record).await.unwrap();
        record
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cola"), "%cola%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let record = seed(&db, "p-1", 10, 2).await;

        let loaded = db.stock().get_by_product("p-1").await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(
            db.stock().get_by_id(record.id()).await.unwrap().map(|r| r.version()),
            Some(0)
        );
        assert!(db.stock().get_by_product("p-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_product_rejected() {
        let db = setup().await;
        seed(&db, "p-1", 1, 0).await;

        let again = StockRecord::new("p-1", 5, 0).unwrap();
        let err = StockRepository::insert(db.pool(), &again).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "p-1"));
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_detects_stale_writes() {
        let db = setup().await;
        seed(&db, "p-1", 10, 0).await;

        let mut first = db.stock().get_by_product("p-1").await.unwrap().unwrap();
        let mut stale = first.clone();

        first.reserve_stock(3).unwrap();
        let saved = StockRepository::update(db.pool(), &first).await.unwrap();
        assert_eq!(saved.version(), 1);
        assert_eq!(saved.available_qty(), 7);

        stale.reserve_stock(8).unwrap();
        let err = StockRepository::update(db.pool(), &stale).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        let current = db.stock().get_by_product("p-1").await.unwrap().unwrap();
        assert_eq!(current.available_qty(), 7);
        assert_eq!(current.reserved_qty(), 3);
    }

    #[tokio::test]
    async fn test_update_batch_is_all_or_nothing() {
        let db = setup().await;
        seed(&db, "p-1", 10, 0).await;
        seed(&db, "p-2", 10, 0).await;

        let mut a = db.stock().get_by_product("p-1").await.unwrap().unwrap();
        let mut b = db.stock().get_by_product("p-2").await.unwrap().unwrap();
        a.set_reorder_level(4).unwrap();
        b.set_reorder_level(6).unwrap();

        // Someone else writes p-2 first, so `b` is stale.
        let mut other = b.clone();
        other.add_stock(1).unwrap();
        StockRepository::update(db.pool(), &other).await.unwrap();

        let err = db.stock().update_batch(&[a.clone(), b]).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        let p1 = db.stock().get_by_product("p-1").await.unwrap().unwrap();
        assert_eq!(p1.reorder_level(), 0);
        assert_eq!(p1.version(), 0);
    }

    #[tokio::test]
    async fn test_list_filters_and_count() {
        let db = setup().await;
        let products = db.products();
        let cola = products.insert("t1", "COLA-330", "Cola 330ml", None).await.unwrap();
        let chips = products.insert("t1", "CHIP-100", "Chips", None).await.unwrap();
        let other = products.insert("t2", "COLA-330", "Cola (t2)", None).await.unwrap();

        seed(&db, &cola.id, 3, 5).await; // low
        seed(&db, &chips.id, 0, 2).await; // out (and low)
        seed(&db, &other.id, 50, 5).await; // fine
        seed(&db, "orphan", 9, 0).await; // no catalog row

        let stock = db.stock();

        let all = stock.list(&StockFilter::default(), Page::default()).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(stock.count(&StockFilter::default()).await.unwrap(), 4);

        let low = stock.list(&StockFilter::low_stock(), Page::default()).await.unwrap();
        let low_ids: Vec<_> = low.iter().map(|l| l.stock.product_id().to_string()).collect();
        assert_eq!(low_ids.len(), 2);
        assert!(low_ids.contains(&cola.id) && low_ids.contains(&chips.id));

        let out = stock.list(&StockFilter::out_of_stock(), Page::default()).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sku.as_deref(), Some("CHIP-100"));

        let search = StockFilter::search("cola").for_tenant("t1");
        let found = stock.list(&search, Page::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].stock.product_id(), cola.id);
        assert_eq!(found[0].tenant_id.as_deref(), Some("t1"));

        let orphan = stock.list(&StockFilter::search("orph"), Page::default()).await.unwrap();
        assert_eq!(orphan.len(), 1);
        assert!(orphan[0].sku.is_none());

        let page = stock.list(&StockFilter::default(), Page::new(3, 2)).await.unwrap();
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn test_hard_delete() {
        let db = setup().await;
        seed(&db, "p-1", 1, 0).await;

        db.stock().hard_delete("p-1").await.unwrap();
        assert!(db.stock().get_by_product("p-1").await.unwrap().is_none());
        assert!(matches!(
            db.stock().hard_delete("p-1").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
