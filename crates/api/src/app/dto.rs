use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use stockroom_core::{Entity, ProductId};
use stockroom_products::{Product, ProductDraft};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /products` and `PUT /products/{id}`.
///
/// An `id` in the body is ignored; the store (or the path) decides it.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[schema(example = "Notebook")]
    pub name: String,
    #[schema(example = "stationery")]
    pub category: String,
    /// Units on hand; must not be negative.
    #[schema(example = 10)]
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 12.99)]
    pub unit_price: Decimal,
}

impl From<ProductRequest> for ProductDraft {
    fn from(body: ProductRequest) -> Self {
        ProductDraft {
            name: body.name,
            category: body.category,
            quantity: body.quantity,
            unit_price: body.unit_price,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    #[schema(value_type = i64)]
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub unit_price: Decimal,
}

/// JSON error body shared by every non-batch failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. `not_found` or `invalid_body`.
    pub error: String,
    pub message: String,
}

impl From<&Product> for ProductResponse {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id(),
            name: p.name().to_string(),
            category: p.category().to_string(),
            quantity: p.quantity(),
            unit_price: p.unit_price(),
        }
    }
}

pub fn products_to_json(products: &[Product]) -> Vec<ProductResponse> {
    products.iter().map(ProductResponse::from).collect()
}
