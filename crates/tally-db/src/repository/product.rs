//! # Product Repository
//!
//! Catalog rows the inventory core reads for tenant scoping and search.
//!
//! The product lifecycle service owns these rows; this repository exists so
//! the lifecycle service (and the seed binary) can write them into the same
//! database, and so stock listings can join against them.
//!
//! ```text
//!   products (tenant_id, sku, name, barcode)
//!        ▲
//!        │ LEFT JOIN on product_id (weak reference, no FK)
//!        │
//!   stock_records
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::Product;

const PRODUCT_COLUMNS: &str =
    "id, tenant_id, sku, barcode, name, is_active, created_at, updated_at";

/// Repository for product catalog rows.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new catalog row and returns it.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - SKU already used within the tenant
    pub async fn insert(
        &self,
        tenant_id: &str,
        sku: &str,
        name: &str,
        barcode: Option<&str>,
    ) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            sku: sku.to_string(),
            barcode: barcode.map(str::to_string),
            name: name.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, barcode, name, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: sku.to_string(),
            },
            other => other,
        })?;

        Ok(product)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by SKU within a tenant.
    pub async fn get_by_sku(&self, tenant_id: &str, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = ?1 AND sku = ?2");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Marks a product inactive.
    ///
    /// The stock record and movement history are untouched.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products of a tenant.
    pub async fn count_active(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE tenant_id = ?1 AND is_active = 1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use crate::DbError;
    use tally_core::DEFAULT_TENANT_ID;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let p = repo
            .insert(DEFAULT_TENANT_ID, "COLA-330", "Cola 330ml", Some("5449000000996"))
            .await
            .unwrap();

        let by_id = repo.get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "COLA-330");
        assert!(by_id.is_active);

        let by_sku = repo.get_by_sku(DEFAULT_TENANT_ID, "COLA-330").await.unwrap();
        assert_eq!(by_sku.map(|p| p.id), Some(p.id));

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku_per_tenant() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert("t1", "SKU-1", "One", None).await.unwrap();
        let err = repo.insert("t1", "SKU-1", "Again", None).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "SKU-1"));

        // Same SKU in another tenant is fine.
        repo.insert("t2", "SKU-1", "Other tenant", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let p = repo.insert("t1", "SKU-1", "One", None).await.unwrap();
        assert_eq!(repo.count_active("t1").await.unwrap(), 1);

        repo.soft_delete(&p.id).await.unwrap();
        assert_eq!(repo.count_active("t1").await.unwrap(), 0);
        assert!(!repo.get_by_id(&p.id).await.unwrap().unwrap().is_active);

        assert!(matches!(
            repo.soft_delete("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
