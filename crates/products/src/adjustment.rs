//! Stock adjustment protocol: batch lines, feasibility and the aggregated plan.
//!
//! A batch is either applied in full or not at all. This module decides which
//! lines of a batch are unavailable against a snapshot of the catalog and how
//! the snapshot changes when none are; loading and persisting the snapshot is
//! left to the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use stockroom_core::{DomainError, DomainResult, Entity, ProductId, ValueObject};

use crate::product::Product;

/// One line of a stock adjustment batch.
///
/// Echoed back verbatim when it cannot be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustmentLine {
    #[schema(value_type = i64, example = 1)]
    pub product_id: ProductId,
    #[schema(example = 2)]
    pub required_quantity: i64,
}

impl StockAdjustmentLine {
    pub fn new(product_id: impl Into<ProductId>, required_quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            required_quantity,
        }
    }
}

impl ValueObject for StockAdjustmentLine {}

/// Direction of a stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDirection {
    /// Debit: reserve stock for a checkout.
    Subtract,
    /// Credit: hand reserved stock back.
    Return,
}

impl StockDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            StockDirection::Subtract => "subtract",
            StockDirection::Return => "return",
        }
    }

    /// Whether `demand` units can be moved for `product` in this direction.
    ///
    /// A missing product is never feasible.
    pub fn is_feasible(self, product: Option<&Product>, demand: i64) -> bool {
        match (self, product) {
            (_, None) => false,
            (StockDirection::Subtract, Some(p)) => p.can_supply(demand),
            (StockDirection::Return, Some(_)) => true,
        }
    }

    pub fn apply(self, product: &mut Product, amount: i64) -> DomainResult<()> {
        match self {
            StockDirection::Subtract => product.withdraw(amount),
            StockDirection::Return => product.restock(amount),
        }
    }
}

/// A validated batch with its demand aggregated per product.
///
/// Lines that name the same product are checked against their combined demand,
/// so a batch can never take more than is on hand by splitting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentPlan {
    direction: StockDirection,
    lines: Vec<StockAdjustmentLine>,
    demand: BTreeMap<ProductId, i64>,
}

impl AdjustmentPlan {
    /// Validate the batch and aggregate its demand.
    ///
    /// Every `required_quantity` must be strictly positive.
    pub fn new(direction: StockDirection, lines: Vec<StockAdjustmentLine>) -> DomainResult<Self> {
        let mut demand: BTreeMap<ProductId, i64> = BTreeMap::new();
        for (idx, line) in lines.iter().enumerate() {
            if line.required_quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "requiredQuantity must be positive (line {idx}, product {}, got {})",
                    line.product_id, line.required_quantity
                )));
            }
            let total = demand.entry(line.product_id).or_insert(0);
            *total = total.checked_add(line.required_quantity).ok_or_else(|| {
                DomainError::validation(format!(
                    "combined requiredQuantity for product {} overflows",
                    line.product_id
                ))
            })?;
        }

        Ok(Self {
            direction,
            lines,
            demand,
        })
    }

    pub fn direction(&self) -> StockDirection {
        self.direction
    }

    pub fn lines(&self) -> &[StockAdjustmentLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Distinct products named by the batch, ascending.
    ///
    /// Stores lock records in this order.
    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.demand.keys().copied()
    }

    /// Combined demand for a product (0 when the batch does not name it).
    pub fn demand_for(&self, id: ProductId) -> i64 {
        self.demand.get(&id).copied().unwrap_or(0)
    }

    /// Lines that cannot be satisfied against `snapshot`, in input order.
    pub fn unavailable(&self, snapshot: &BTreeMap<ProductId, Product>) -> Vec<StockAdjustmentLine> {
        self.lines
            .iter()
            .filter(|line| {
                !self
                    .direction
                    .is_feasible(snapshot.get(&line.product_id), self.demand_for(line.product_id))
            })
            .copied()
            .collect()
    }

    /// Apply the aggregated demand to a snapshot, returning the changed products
    /// in ascending id order.
    ///
    /// Only meaningful once [`AdjustmentPlan::unavailable`] came back empty for
    /// the same snapshot; a missing product is reported as an invariant violation.
    pub fn apply(&self, mut snapshot: BTreeMap<ProductId, Product>) -> DomainResult<Vec<Product>> {
        let mut changed = Vec::with_capacity(self.demand.len());
        for (&id, &amount) in &self.demand {
            let mut product = snapshot.remove(&id).ok_or_else(|| {
                DomainError::invariant(format!("product {id} missing from adjustment snapshot"))
            })?;
            self.direction.apply(&mut product, amount)?;
            changed.push(product);
        }
        debug_assert!(changed.iter().all(|p| p.quantity() >= 0));
        debug_assert!(changed.windows(2).all(|w| w[0].id() < w[1].id()));
        Ok(changed)
    }
}

/// Join the product ids of `lines` for a human-readable message.
pub fn joined_ids(lines: &[StockAdjustmentLine]) -> String {
    lines
        .iter()
        .map(|l| l.product_id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
