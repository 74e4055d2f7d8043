//! # Product Repository
//!
//! Catalog rows. The settlement engine only reads them; inserts come from
//! catalog management and the seed binary.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tillpoint_core::{Money, Product};

const PRODUCT_COLUMNS: &str =
    "id, sku, name, price_cents, cost_cents, is_active, created_at, updated_at";

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> ProductRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        ProductRepository { conn }
    }

    /// Gets a product by its ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(product)
    }

    /// Lists active products ordered by name.
    pub async fn list_active(&mut self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit as i64)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(products)
    }

    /// Inserts a new active product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(
        &mut self,
        sku: &str,
        name: &str,
        price: Money,
        cost: Money,
    ) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            price_cents: price.cents(),
            cost_cents: cost.cents(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price_cents, cost_cents, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use tillpoint_core::Money;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let p = uow
            .products()
            .insert("SCR-IP12", "Screen protector", Money::from_cents(1000), Money::from_cents(400))
            .await
            .unwrap();

        let by_id = uow.products().get(&p.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "SCR-IP12");
        assert_eq!(by_id.price(), Money::from_cents(1000));

        let dup = uow
            .products()
            .insert("SCR-IP12", "Again", Money::from_cents(1), Money::zero())
            .await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
    }
}
