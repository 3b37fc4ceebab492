//! Batch stock adjustment endpoints.
//!
//! Both answer `text/plain`: a fixed success sentence, or a 422 listing the
//! product ids of every line that could not be satisfied.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};

use stockroom_infra::AdjustError;
use stockroom_products::{joined_ids, StockAdjustmentLine};

use crate::app::dto::ErrorResponse;
use crate::app::{errors, extract::ApiJson};
use crate::app::services::AppServices;

pub const SUBTRACT_OK: &str = "Stock updated successfully.";
pub const RETURN_OK: &str = "Products returned to stock successfully.";

pub fn router() -> Router {
    Router::new()
        .route("/subtract-stock", post(subtract_stock))
        .route("/return-stock", post(return_stock))
}

#[utoipa::path(
    post,
    path = "/products/subtract-stock",
    tag = "stock",
    request_body = [StockAdjustmentLine],
    responses(
        (status = 200, description = "Every line applied", body = String, content_type = "text/plain",
            example = json!("Stock updated successfully.")),
        (status = 400, description = "Malformed body or non-positive quantity", body = ErrorResponse),
        (status = 422, description = "Nothing changed; lists products missing or short of stock",
            body = String, content_type = "text/plain",
            example = json!("Insufficient stock for products: 2"))
    )
)]
pub async fn subtract_stock(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(lines): ApiJson<Vec<StockAdjustmentLine>>,
) -> axum::response::Response {
    let result = services.adjuster.subtract_stock(lines).await;
    batch_response(result, SUBTRACT_OK, "Insufficient stock for products: ")
}

#[utoipa::path(
    post,
    path = "/products/return-stock",
    tag = "stock",
    request_body = [StockAdjustmentLine],
    responses(
        (status = 200, description = "Every line applied", body = String, content_type = "text/plain",
            example = json!("Products returned to stock successfully.")),
        (status = 400, description = "Malformed body or non-positive quantity", body = ErrorResponse),
        (status = 422, description = "Nothing changed; lists products that do not exist",
            body = String, content_type = "text/plain",
            example = json!("Products not found: 99"))
    )
)]
pub async fn return_stock(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(lines): ApiJson<Vec<StockAdjustmentLine>>,
) -> axum::response::Response {
    let result = services.adjuster.return_stock(lines).await;
    batch_response(result, RETURN_OK, "Products not found: ")
}

fn batch_response(
    result: Result<Vec<StockAdjustmentLine>, AdjustError>,
    success: &'static str,
    failure_prefix: &str,
) -> axum::response::Response {
    match result {
        Ok(unavailable) if unavailable.is_empty() => (StatusCode::OK, success).into_response(),
        Ok(unavailable) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("{failure_prefix}{}", joined_ids(&unavailable)),
        )
            .into_response(),
        Err(e) => errors::adjust_error_to_response(e),
    }
}
