//! Products domain module.
//!
//! This crate contains the catalog record and the rules of the stock adjustment
//! protocol, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod adjustment;
pub mod product;

pub use adjustment::{joined_ids, AdjustmentPlan, StockAdjustmentLine, StockDirection};
pub use product::{Product, ProductDraft};
