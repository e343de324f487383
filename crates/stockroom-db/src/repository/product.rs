//! # Product Repository
//!
//! The product table belongs to the catalog. The ledger only reads products
//! and writes back two fields:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products                                                               │
//! │  ├── stock_quantity      ← round(item.current_stock) after every change │
//! │  └── low_stock_threshold ← round(item.minimum_stock_level) if unset/0   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use stockroom_core::Product;

const PRODUCT_COLUMNS: &str = r#"
    id, tenant_id, sku, name, description, vendor_price,
    stock_quantity, low_stock_threshold, created_at, updated_at
"#;

/// Repository for product reads and the stock mirror.
#[derive(Debug)]
pub struct ProductRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ProductRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ProductRepository { conn }
    }

    /// Gets a product by ID within the tenant.
    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE tenant_id = ?1 AND id = ?2",
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(product)
    }

    pub async fn get_by_sku(&mut self, tenant_id: &str, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE tenant_id = ?1 AND sku = ?2",
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(sku)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(product)
    }

    /// Inserts a product. Used by the seed binary and tests; the catalog
    /// owns product creation in production.
    pub async fn insert(&mut self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, name, description, vendor_price,
                stock_quantity, low_stock_threshold, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.vendor_price)
        .bind(product.stock_quantity)
        .bind(product.low_stock_threshold)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(product_id = %product.id, sku = %product.sku, "Inserted product");
        Ok(())
    }

    /// Writes the rounded stock quantity and, when given, the threshold.
    ///
    /// `low_stock_threshold = None` leaves the stored threshold untouched.
    pub async fn mirror_stock(
        &mut self,
        tenant_id: &str,
        id: &str,
        stock_quantity: i64,
        low_stock_threshold: Option<i64>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = ?3,
                low_stock_threshold = COALESCE(?4, low_stock_threshold),
                updated_at = ?5
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(stock_quantity)
        .bind(low_stock_threshold)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
