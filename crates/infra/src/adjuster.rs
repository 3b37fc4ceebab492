//! Stock adjustment engine.
//!
//! Applies a batch of stock adjustment lines all-or-nothing: either every line
//! is applied, or nothing changes and the unsatisfiable lines are returned.
//!
//! ## Protocol
//!
//! Both directions run the same two passes inside one store transaction:
//!
//! 1. **Validation pass**: lock every product the batch names (ascending id)
//!    and check feasibility of each line against its product's combined demand.
//! 2. **Commit pass**: only when no line is unavailable, move the stock and
//!    commit. Otherwise the transaction is dropped and nothing is written.
//!
//! An empty result means "fully applied, safe to proceed"; a non-empty result
//! means "nothing changed". Callers (the payments flow) rely on that split when
//! reserving and releasing stock during checkout.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, instrument};

use stockroom_core::{DomainError, ProductId};
use stockroom_products::{AdjustmentPlan, Product, StockAdjustmentLine, StockDirection};

use crate::store::{ProductStore, StoreError};

/// Stock adjustment failure.
///
/// An unsatisfiable batch is **not** an error; it is reported through the
/// returned unavailable lines.
#[derive(Debug, Error)]
pub enum AdjustError {
    /// The batch itself is malformed (non-positive quantity, overflow).
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs stock adjustment batches against an injected store.
#[derive(Debug, Clone)]
pub struct StockAdjuster<S> {
    store: S,
}

impl<S> StockAdjuster<S>
where
    S: ProductStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reserve stock. Returns the lines that could not be satisfied.
    ///
    /// A line is unavailable when its product does not exist or holds fewer
    /// units than the batch asks of it.
    pub async fn subtract_stock(
        &self,
        lines: Vec<StockAdjustmentLine>,
    ) -> Result<Vec<StockAdjustmentLine>, AdjustError> {
        self.adjust(StockDirection::Subtract, lines).await
    }

    /// Hand stock back. Returns the lines whose product does not exist.
    pub async fn return_stock(
        &self,
        lines: Vec<StockAdjustmentLine>,
    ) -> Result<Vec<StockAdjustmentLine>, AdjustError> {
        self.adjust(StockDirection::Return, lines).await
    }

    #[instrument(
        skip(self, lines),
        fields(direction = direction.as_str(), line_count = lines.len()),
        err
    )]
    async fn adjust(
        &self,
        direction: StockDirection,
        lines: Vec<StockAdjustmentLine>,
    ) -> Result<Vec<StockAdjustmentLine>, AdjustError> {
        let plan = AdjustmentPlan::new(direction, lines)?;
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.store.begin().await?;

        let mut snapshot: BTreeMap<ProductId, Product> = BTreeMap::new();
        for id in plan.product_ids() {
            if let Some(product) = tx.find_for_update(id).await? {
                snapshot.insert(id, product);
            }
        }

        let unavailable = plan.unavailable(&snapshot);
        if !unavailable.is_empty() {
            info!(
                unavailable = unavailable.len(),
                product_ids = %stockroom_products::joined_ids(&unavailable),
                "stock adjustment rejected"
            );
            return Ok(unavailable);
        }

        let changed = plan.apply(snapshot)?;
        let product_count = changed.len();
        for product in changed {
            tx.save(product).await?;
        }
        tx.commit().await?;

        info!(product_count, "stock adjustment applied");
        Ok(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use stockroom_core::Entity;
    use stockroom_products::ProductDraft;

    use crate::store::{InMemoryProductStore, StockTransaction, StoreResult};

    fn draft(quantity: i64) -> ProductDraft {
        ProductDraft {
            name: "widget".to_string(),
            category: "parts".to_string(),
            quantity,
            unit_price: Decimal::new(999, 2),
        }
    }

    fn line(id: i64, qty: i64) -> StockAdjustmentLine {
        StockAdjustmentLine::new(id, qty)
    }

    async fn quantity_of<S: ProductStore>(store: &S, id: i64) -> i64 {
        store
            .find_by_id(ProductId::new(id))
            .await
            .unwrap()
            .expect("product present")
            .quantity()
    }

    /// Store {1: 10, 2: 3}.
    async fn seeded() -> StockAdjuster<Arc<InMemoryProductStore>> {
        let store = Arc::new(InMemoryProductStore::new());
        store.insert(draft(10)).await.unwrap();
        store.insert(draft(3)).await.unwrap();
        StockAdjuster::new(store)
    }

    /// Counts transactions so tests can assert "no store writes".
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryProductStore,
        transactions: AtomicUsize,
    }

    #[async_trait]
    impl ProductStore for CountingStore {
        async fn find_by_id(&self, id: ProductId) -> StoreResult<Option<Product>> {
            self.inner.find_by_id(id).await
        }
        async fn find_all(&self) -> StoreResult<Vec<Product>> {
            self.inner.find_all().await
        }
        async fn find_by_category(&self, category: &str) -> StoreResult<Vec<Product>> {
            self.inner.find_by_category(category).await
        }
        async fn insert(&self, draft: ProductDraft) -> StoreResult<Product> {
            self.inner.insert(draft).await
        }
        async fn update(&self, id: ProductId, draft: ProductDraft) -> StoreResult<Option<Product>> {
            self.inner.update(id, draft).await
        }
        async fn exists(&self, id: ProductId) -> StoreResult<bool> {
            self.inner.exists(id).await
        }
        async fn delete(&self, id: ProductId) -> StoreResult<bool> {
            self.inner.delete(id).await
        }
        async fn begin<'a>(&'a self) -> StoreResult<Box<dyn StockTransaction + 'a>> {
            self.transactions.fetch_add(1, Ordering::SeqCst);
            self.inner.begin().await
        }
    }

    #[tokio::test]
    async fn subtract_exact_stock_leaves_zero() {
        let adjuster = seeded().await;
        let unavailable = adjuster.subtract_stock(vec![line(1, 10)]).await.unwrap();
        assert!(unavailable.is_empty());
        assert_eq!(quantity_of(adjuster.store(), 1).await, 0);
    }

    #[tokio::test]
    async fn subtract_one_more_than_stock_is_rejected() {
        let adjuster = seeded().await;
        let unavailable = adjuster.subtract_stock(vec![line(1, 11)]).await.unwrap();
        assert_eq!(unavailable, vec![line(1, 11)]);
        assert_eq!(quantity_of(adjuster.store(), 1).await, 10);
    }

    #[tokio::test]
    async fn rejected_batch_leaves_every_product_untouched() {
        let adjuster = seeded().await;
        let unavailable = adjuster
            .subtract_stock(vec![line(1, 5), line(2, 10)])
            .await
            .unwrap();

        assert_eq!(unavailable, vec![line(2, 10)]);
        assert_eq!(quantity_of(adjuster.store(), 1).await, 10);
        assert_eq!(quantity_of(adjuster.store(), 2).await, 3);
    }

    #[tokio::test]
    async fn feasible_batch_is_applied() {
        let adjuster = seeded().await;
        let unavailable = adjuster.subtract_stock(vec![line(1, 5)]).await.unwrap();
        assert!(unavailable.is_empty());
        assert_eq!(quantity_of(adjuster.store(), 1).await, 5);
        assert_eq!(quantity_of(adjuster.store(), 2).await, 3);
    }

    #[tokio::test]
    async fn subtract_reports_missing_products() {
        let adjuster = seeded().await;
        let unavailable = adjuster
            .subtract_stock(vec![line(1, 1), line(42, 1)])
            .await
            .unwrap();
        assert_eq!(unavailable, vec![line(42, 1)]);
        assert_eq!(quantity_of(adjuster.store(), 1).await, 10);
    }

    #[tokio::test]
    async fn return_against_empty_store_reports_the_line() {
        let adjuster = StockAdjuster::new(InMemoryProductStore::new());
        let unavailable = adjuster.return_stock(vec![line(99, 2)]).await.unwrap();
        assert_eq!(unavailable, vec![line(99, 2)]);
    }

    #[tokio::test]
    async fn return_has_no_ceiling() {
        let adjuster = seeded().await;
        let unavailable = adjuster
            .return_stock(vec![line(1, 1_000), line(2, 1)])
            .await
            .unwrap();
        assert!(unavailable.is_empty());
        assert_eq!(quantity_of(adjuster.store(), 1).await, 1_010);
        assert_eq!(quantity_of(adjuster.store(), 2).await, 4);
    }

    #[tokio::test]
    async fn return_with_missing_product_changes_nothing() {
        let adjuster = seeded().await;
        let unavailable = adjuster
            .return_stock(vec![line(1, 4), line(7, 1)])
            .await
            .unwrap();
        assert_eq!(unavailable, vec![line(7, 1)]);
        assert_eq!(quantity_of(adjuster.store(), 1).await, 10);
    }

    #[tokio::test]
    async fn return_then_subtract_restores_quantity() {
        let adjuster = seeded().await;
        assert!(adjuster.return_stock(vec![line(2, 6)]).await.unwrap().is_empty());
        assert!(adjuster.subtract_stock(vec![line(2, 6)]).await.unwrap().is_empty());
        assert_eq!(quantity_of(adjuster.store(), 2).await, 3);
    }

    #[tokio::test]
    async fn duplicate_lines_are_checked_against_combined_demand() {
        let adjuster = seeded().await;

        // 2 + 2 <= 3 is false: both lines are reported, nothing moves.
        let unavailable = adjuster
            .subtract_stock(vec![line(2, 2), line(1, 1), line(2, 2)])
            .await
            .unwrap();
        assert_eq!(unavailable, vec![line(2, 2), line(2, 2)]);
        assert_eq!(quantity_of(adjuster.store(), 2).await, 3);
        assert_eq!(quantity_of(adjuster.store(), 1).await, 10);

        let unavailable = adjuster
            .subtract_stock(vec![line(2, 1), line(2, 2)])
            .await
            .unwrap();
        assert!(unavailable.is_empty());
        assert_eq!(quantity_of(adjuster.store(), 2).await, 0);
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let store = Arc::new(CountingStore::default());
        store.insert(draft(5)).await.unwrap();
        let adjuster = StockAdjuster::new(store.clone());

        assert!(adjuster.subtract_stock(vec![]).await.unwrap().is_empty());
        assert!(adjuster.return_stock(vec![]).await.unwrap().is_empty());
        assert_eq!(store.transactions.load(Ordering::SeqCst), 0);
        assert_eq!(quantity_of(&store, 1).await, 5);
    }

    #[tokio::test]
    async fn non_positive_quantities_are_rejected_before_the_store() {
        let store = Arc::new(CountingStore::default());
        store.insert(draft(5)).await.unwrap();
        let adjuster = StockAdjuster::new(store.clone());

        for qty in [0, -2] {
            let err = adjuster
                .subtract_stock(vec![line(1, 1), line(1, qty)])
                .await
                .unwrap_err();
            assert!(matches!(err, AdjustError::Domain(DomainError::Validation(_))));
            let err = adjuster.return_stock(vec![line(1, qty)]).await.unwrap_err();
            assert!(matches!(err, AdjustError::Domain(DomainError::Validation(_))));
        }
        assert_eq!(store.transactions.load(Ordering::SeqCst), 0);
        assert_eq!(quantity_of(&store, 1).await, 5);
    }

    #[tokio::test]
    async fn return_overflow_is_rejected_without_writes() {
        let store = Arc::new(InMemoryProductStore::new());
        store.insert(draft(i64::MAX - 1)).await.unwrap();
        store.insert(draft(0)).await.unwrap();
        let adjuster = StockAdjuster::new(store.clone());

        let err = adjuster
            .return_stock(vec![line(2, 5), line(1, 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, AdjustError::Domain(DomainError::Validation(_))));
        assert_eq!(quantity_of(&store, 1).await, i64::MAX - 1);
        assert_eq!(quantity_of(&store, 2).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_batches_never_oversell() {
        let store = Arc::new(InMemoryProductStore::new());
        let product = store.insert(draft(10)).await.unwrap();
        let adjuster = Arc::new(StockAdjuster::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let adjuster = adjuster.clone();
            let id = product.id().get();
            handles.push(tokio::spawn(async move {
                adjuster.subtract_stock(vec![line(id, 3)]).await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap().is_empty() {
                applied += 1;
            }
        }

        assert_eq!(applied, 3);
        assert_eq!(quantity_of(&store, product.id().get()).await, 1);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn runtime() -> tokio::runtime::Runtime {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime")
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 200,
                ..ProptestConfig::default()
            })]

            /// Property: subtract(q) empties a product, subtract(q + 1) leaves it alone.
            #[test]
            fn subtract_boundary(q in 0i64..10_000) {
                runtime().block_on(async {
                    let store = Arc::new(InMemoryProductStore::new());
                    store.insert(draft(q)).await.unwrap();
                    let adjuster = StockAdjuster::new(store.clone());

                    let over = adjuster.subtract_stock(vec![line(1, q + 1)]).await.unwrap();
                    assert_eq!(over, vec![line(1, q + 1)]);
                    assert_eq!(quantity_of(&store, 1).await, q);

                    if q > 0 {
                        let exact = adjuster.subtract_stock(vec![line(1, q)]).await.unwrap();
                        assert!(exact.is_empty());
                        assert_eq!(quantity_of(&store, 1).await, 0);
                    }
                });
            }

            /// Property: return(n) followed by subtract(n) is the identity on quantity.
            #[test]
            fn return_then_subtract_round_trips(q in 0i64..10_000, n in 1i64..10_000) {
                runtime().block_on(async {
                    let store = Arc::new(InMemoryProductStore::new());
                    store.insert(draft(q)).await.unwrap();
                    let adjuster = StockAdjuster::new(store.clone());

                    assert!(adjuster.return_stock(vec![line(1, n)]).await.unwrap().is_empty());
                    assert!(adjuster.subtract_stock(vec![line(1, n)]).await.unwrap().is_empty());
                    assert_eq!(quantity_of(&store, 1).await, q);
                });
            }
        }
    }
}
