//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two values with the same attributes are
/// interchangeable. A stock adjustment line, for instance, is echoed back to the
/// caller verbatim and compared field by field.
///
/// - **Value Object**: no identity (`StockAdjustmentLine { product_id, required_quantity }`)
/// - **Entity**: has identity (`Product { id, .. }`)
///
/// Value objects should be immutable; to "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
