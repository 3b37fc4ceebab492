//! OpenAPI document for the catalog and stock endpoints, served at
//! `GET /api-docs/openapi.json`.

use axum::Json;
use utoipa::OpenApi;

use stockroom_products::StockAdjustmentLine;

use crate::app::dto::{ErrorResponse, ProductRequest, ProductResponse};
use crate::app::routes::{products, stock};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockroom",
        description = "Product catalog and all-or-nothing stock adjustment batches"
    ),
    paths(
        products::list_products,
        products::get_product,
        products::list_by_category,
        products::create_product,
        products::update_product,
        products::delete_product,
        stock::subtract_stock,
        stock::return_stock,
    ),
    components(schemas(ProductRequest, ProductResponse, ErrorResponse, StockAdjustmentLine)),
    tags(
        (name = "products", description = "Product catalog"),
        (name = "stock", description = "Reserve and release stock for checkouts")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
