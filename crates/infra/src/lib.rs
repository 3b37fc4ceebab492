//! Infrastructure layer: product persistence and the stock adjustment engine.

pub mod adjuster;
pub mod store;

pub use adjuster::{AdjustError, StockAdjuster};
pub use store::{InMemoryProductStore, ProductStore, StockTransaction, StoreError, StoreResult};
#[cfg(feature = "postgres")]
pub use store::PostgresProductStore;
