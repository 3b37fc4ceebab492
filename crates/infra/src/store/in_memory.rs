use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockWriteGuard};

use stockroom_core::{Entity, ProductId};
use stockroom_products::{Product, ProductDraft};

use super::{ProductStore, StockTransaction, StoreResult};

#[derive(Debug, Default)]
struct Catalog {
    products: BTreeMap<ProductId, Product>,
    last_id: i64,
}

impl Catalog {
    fn put(&mut self, product: Product) {
        self.last_id = self.last_id.max(product.id().get());
        self.products.insert(product.id(), product);
    }
}

/// In-memory product store for tests/dev.
///
/// A transaction holds the write lock for its whole span, so stock adjustments
/// are serialized against each other and against plain writes.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    inner: RwLock<Catalog>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn find_by_id(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn find_all(&self) -> StoreResult<Vec<Product>> {
        Ok(self.inner.read().await.products.values().cloned().collect())
    }

    async fn find_by_category(&self, category: &str) -> StoreResult<Vec<Product>> {
        let catalog = self.inner.read().await;
        Ok(catalog
            .products
            .values()
            .filter(|p| p.category() == category)
            .cloned()
            .collect())
    }

    async fn insert(&self, draft: ProductDraft) -> StoreResult<Product> {
        let mut catalog = self.inner.write().await;
        let product = Product::new(ProductId::new(catalog.last_id + 1), draft)?;
        catalog.put(product.clone());
        Ok(product)
    }

    async fn update(&self, id: ProductId, draft: ProductDraft) -> StoreResult<Option<Product>> {
        let mut catalog = self.inner.write().await;
        let Some(existing) = catalog.products.get(&id) else {
            return Ok(None);
        };
        let updated = existing.clone().replace(draft)?;
        catalog.put(updated.clone());
        Ok(Some(updated))
    }

    async fn exists(&self, id: ProductId) -> StoreResult<bool> {
        Ok(self.inner.read().await.products.contains_key(&id))
    }

    async fn delete(&self, id: ProductId) -> StoreResult<bool> {
        Ok(self.inner.write().await.products.remove(&id).is_some())
    }

    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn StockTransaction + 'a>> {
        let catalog = self.inner.write().await;
        Ok(Box::new(InMemoryStockTransaction {
            catalog,
            staged: BTreeMap::new(),
        }))
    }
}

struct InMemoryStockTransaction<'a> {
    catalog: RwLockWriteGuard<'a, Catalog>,
    staged: BTreeMap<ProductId, Product>,
}

#[async_trait]
impl<'a> StockTransaction for InMemoryStockTransaction<'a> {
    async fn find_for_update(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self
            .staged
            .get(&id)
            .or_else(|| self.catalog.products.get(&id))
            .cloned())
    }

    async fn save(&mut self, product: Product) -> StoreResult<()> {
        self.staged.insert(product.id(), product);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryStockTransaction {
            mut catalog,
            staged,
        } = *self;
        for (_, product) in staged {
            catalog.put(product);
        }
        Ok(())
    }
}
