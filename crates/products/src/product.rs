use rust_decimal::Decimal;

use stockroom_core::{DomainError, DomainResult, Entity, ProductId};

/// Attributes of a product as supplied by a client (create / full replace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl ProductDraft {
    /// Quantity is the only attribute with a domain rule attached to it.
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity < 0 {
            return Err(DomainError::validation(format!(
                "quantity cannot be negative (got {})",
                self.quantity
            )));
        }
        Ok(())
    }
}

/// Catalog record: a product and the stock currently on hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    category: String,
    quantity: i64,
    unit_price: Decimal,
}

impl Product {
    /// Build a product from a validated draft and a store-assigned id.
    pub fn new(id: ProductId, draft: ProductDraft) -> DomainResult<Self> {
        draft.validate()?;
        Ok(Self {
            id,
            name: draft.name,
            category: draft.category,
            quantity: draft.quantity,
            unit_price: draft.unit_price,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Full-record replacement; the id is kept.
    pub fn replace(self, draft: ProductDraft) -> DomainResult<Self> {
        Self::new(self.id, draft)
    }

    /// Whether `amount` units can be taken from stock.
    pub fn can_supply(&self, amount: i64) -> bool {
        self.quantity >= amount
    }

    pub fn withdraw(&mut self, amount: i64) -> DomainResult<()> {
        if amount < 0 {
            return Err(DomainError::validation("withdrawn amount must not be negative"));
        }
        if !self.can_supply(amount) {
            return Err(DomainError::invariant(format!(
                "product {} has {} units, cannot withdraw {}",
                self.id, self.quantity, amount
            )));
        }
        self.quantity -= amount;
        Ok(())
    }

    pub fn restock(&mut self, amount: i64) -> DomainResult<()> {
        if amount < 0 {
            return Err(DomainError::validation("restocked amount must not be negative"));
        }
        self.quantity = self.quantity.checked_add(amount).ok_or_else(|| {
            DomainError::validation(format!(
                "restocking {} units would overflow product {}",
                amount, self.id
            ))
        })?;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}
