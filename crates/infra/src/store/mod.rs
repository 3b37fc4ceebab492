//! Inventory store: persistence of catalog records.
//!
//! `ProductStore` is the key/value surface the service needs (point lookups,
//! category scans, upserts, deletes). `StockTransaction` is the isolated scope
//! the stock adjuster runs both of its passes in; a store guarantees that no
//! other writer can change a record between `find_for_update` and `commit`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::{DomainError, ProductId};
use stockroom_products::{Product, ProductDraft};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryProductStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresProductStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation error.
///
/// These are **infrastructure errors**; they are propagated to the caller, never
/// turned into "not found".
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A persisted record could not be turned back into a domain value.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    /// A value handed to the store broke a domain rule.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Catalog persistence.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_id(&self, id: ProductId) -> StoreResult<Option<Product>>;

    /// All products, ascending by id.
    async fn find_all(&self) -> StoreResult<Vec<Product>>;

    /// Products whose category matches exactly, ascending by id.
    async fn find_by_category(&self, category: &str) -> StoreResult<Vec<Product>>;

    /// Persist a new product under the next free id.
    async fn insert(&self, draft: ProductDraft) -> StoreResult<Product>;

    /// Replace every attribute of an existing product in one step.
    ///
    /// Returns `None` (and writes nothing) when no product has `id`.
    async fn update(&self, id: ProductId, draft: ProductDraft) -> StoreResult<Option<Product>>;

    async fn exists(&self, id: ProductId) -> StoreResult<bool>;

    /// Returns `true` when a record was removed.
    async fn delete(&self, id: ProductId) -> StoreResult<bool>;

    /// Open an isolated read-modify-write scope.
    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn StockTransaction + 'a>>;
}

/// Isolated read-modify-write scope over the store.
///
/// Writes become visible on `commit`; dropping the transaction discards them.
#[async_trait]
pub trait StockTransaction: Send {
    /// Read a record and hold it against concurrent writers until the scope ends.
    async fn find_for_update(&mut self, id: ProductId) -> StoreResult<Option<Product>>;

    async fn save(&mut self, product: Product) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn find_by_id(&self, id: ProductId) -> StoreResult<Option<Product>> {
        (**self).find_by_id(id).await
    }

    async fn find_all(&self) -> StoreResult<Vec<Product>> {
        (**self).find_all().await
    }

    async fn find_by_category(&self, category: &str) -> StoreResult<Vec<Product>> {
        (**self).find_by_category(category).await
    }

    async fn insert(&self, draft: ProductDraft) -> StoreResult<Product> {
        (**self).insert(draft).await
    }

    async fn update(&self, id: ProductId, draft: ProductDraft) -> StoreResult<Option<Product>> {
        (**self).update(id, draft).await
    }

    async fn exists(&self, id: ProductId) -> StoreResult<bool> {
        (**self).exists(id).await
    }

    async fn delete(&self, id: ProductId) -> StoreResult<bool> {
        (**self).delete(id).await
    }

    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn StockTransaction + 'a>> {
        (**self).begin().await
    }
}
