//! Postgres-backed product store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (check constraint violation) | `23514` | `Domain` (quantity below zero) |
//! | Database (other) | Any other | `Unavailable` |
//! | PoolClosed / Io / Tls / other | N/A | `Unavailable` |
//!
//! ## Locking
//!
//! `begin()` opens a database transaction. `find_for_update` issues
//! `SELECT ... FOR UPDATE`, so the row stays locked until commit or rollback.
//! The stock adjuster asks for rows in ascending id order, which keeps two
//! overlapping batches from deadlocking each other.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use stockroom_core::{DomainError, Entity, ProductId};
use stockroom_products::{Product, ProductDraft};

use super::{ProductStore, StockTransaction, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id          BIGSERIAL PRIMARY KEY,
    name        TEXT           NOT NULL,
    category    TEXT           NOT NULL,
    quantity    BIGINT         NOT NULL CHECK (quantity >= 0),
    unit_price  NUMERIC(19, 4) NOT NULL
);
CREATE INDEX IF NOT EXISTS products_category_idx ON products (category);
"#;

const SELECT_COLUMNS: &str = "SELECT id, name, category, quantity, unit_price FROM products";

/// Postgres-backed product store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: Arc<PgPool>,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `products` table if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_by_id(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_all(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_all", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_by_category(&self, category: &str) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} WHERE category = $1 ORDER BY id"))
            .bind(category)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_category", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, draft), err)]
    async fn insert(&self, draft: ProductDraft) -> StoreResult<Product> {
        draft.validate()?;
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, category, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, category, quantity, unit_price
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.category)
        .bind(draft.quantity)
        .bind(draft.unit_price)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;
        product_from_row(&row)
    }

    #[instrument(skip(self, draft), fields(product_id = %id), err)]
    async fn update(&self, id: ProductId, draft: ProductDraft) -> StoreResult<Option<Product>> {
        draft.validate()?;
        let row = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, category = $3, quantity = $4, unit_price = $5
            WHERE id = $1
            RETURNING id, name, category, quantity, unit_price
            "#,
        )
        .bind(id.get())
        .bind(&draft.name)
        .bind(&draft.category)
        .bind(draft.quantity)
        .bind(draft.unit_price)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn exists(&self, id: ProductId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1) AS present")
            .bind(id.get())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists", e))?;
        row.try_get::<bool, _>("present")
            .map_err(|e| StoreError::InvalidRecord(format!("exists: {e}")))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete(&self, id: ProductId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn StockTransaction + 'a>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresStockTransaction { tx }))
    }
}

struct PostgresStockTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTransaction for PostgresStockTransaction {
    async fn find_for_update(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1 FOR UPDATE"))
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_for_update", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn save(&mut self, product: Product) -> StoreResult<()> {
        sqlx::query("UPDATE products SET quantity = $2 WHERE id = $1")
            .bind(product.id().get())
            .bind(product.quantity())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("transaction_save", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    let decode = |e: sqlx::Error| StoreError::InvalidRecord(format!("failed to decode product row: {e}"));
    let id: i64 = row.try_get("id").map_err(decode)?;
    let draft = ProductDraft {
        name: row.try_get("name").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        quantity: row.try_get("quantity").map_err(decode)?,
        unit_price: row.try_get::<Decimal, _>("unit_price").map_err(decode)?,
    };
    Product::new(ProductId::new(id), draft)
        .map_err(|e| StoreError::InvalidRecord(format!("product {id}: {e}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Check constraint violation (quantity >= 0)
                Some("23514") => StoreError::Domain(DomainError::invariant(msg)),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use stockroom_products::StockAdjustmentLine;

    use crate::StockAdjuster;

    async fn store() -> PostgresProductStore {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
        let store = PostgresProductStore::connect(&database_url, 5).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    /// A category no other run has used, so lookups see only this test's rows.
    fn fresh_category(tag: &str) -> String {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        format!("{tag}-{nanos}")
    }

    fn draft(category: &str, quantity: i64) -> ProductDraft {
        ProductDraft {
            name: "widget".to_string(),
            category: category.to_string(),
            quantity,
            unit_price: Decimal::new(1999, 2),
        }
    }

    #[tokio::test]
    #[ignore = "Requires DATABASE_URL"]
    async fn crud_round_trip() {
        let store = store().await;
        let category = fresh_category("crud");

        let created = store.insert(draft(&category, 4)).await.unwrap();
        assert_eq!(store.find_by_id(created.id()).await.unwrap(), Some(created.clone()));
        assert_eq!(store.find_by_category(&category).await.unwrap(), vec![created.clone()]);
        assert_eq!(created.unit_price(), Decimal::new(1999, 2));

        let updated = store
            .update(created.id(), draft(&category, 9))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity(), 9);
        assert!(store.exists(created.id()).await.unwrap());

        assert!(store.delete(created.id()).await.unwrap());
        assert!(!store.delete(created.id()).await.unwrap());
        assert_eq!(store.update(created.id(), draft(&category, 1)).await.unwrap(), None);
        assert_eq!(store.find_by_id(created.id()).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "Requires DATABASE_URL"]
    async fn locked_row_holds_back_a_concurrent_batch() {
        let store = store().await;
        let product = store.insert(draft(&fresh_category("lock"), 10)).await.unwrap();
        let id = product.id();

        let mut tx = store.begin().await.unwrap();
        let mut locked = tx.find_for_update(id).await.unwrap().unwrap();

        let adjuster = StockAdjuster::new(store.clone());
        let contender = tokio::spawn(async move {
            adjuster.subtract_stock(vec![StockAdjustmentLine::new(id, 8)]).await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!contender.is_finished(), "batch must wait for the row lock");

        locked.withdraw(5).unwrap();
        tx.save(locked).await.unwrap();
        tx.commit().await.unwrap();

        // The waiting batch sees the committed quantity (5) and is rejected.
        let unavailable = contender.await.unwrap().unwrap();
        assert_eq!(unavailable, vec![StockAdjustmentLine::new(id, 8)]);
        assert_eq!(store.find_by_id(id).await.unwrap().unwrap().quantity(), 5);

        store.delete(id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires DATABASE_URL"]
    async fn negative_quantity_check_maps_to_invariant_violation() {
        let store = store().await;
        let product = store.insert(draft(&fresh_category("check"), 1)).await.unwrap();

        let err = sqlx::query("UPDATE products SET quantity = -1 WHERE id = $1")
            .bind(product.id().get())
            .execute(&*store.pool)
            .await
            .unwrap_err();
        assert!(matches!(
            map_sqlx_error("test", err),
            StoreError::Domain(DomainError::InvariantViolation(_))
        ));

        store.delete(product.id()).await.unwrap();
    }
}
