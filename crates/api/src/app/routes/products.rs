use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockroom_core::{Entity, ProductId};
use stockroom_products::ProductDraft;

use crate::app::dto::{ErrorResponse, ProductRequest, ProductResponse};
use crate::app::{dto, errors, extract::ApiJson};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/categories/:name", get(list_by_category))
}

#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    responses(
        (status = 200, description = "Every product in the catalog", body = [ProductResponse])
    )
)]
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store.find_all().await {
        Ok(products) => (StatusCode::OK, Json(dto::products_to_json(&products))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product", body = ProductResponse),
        (status = 400, description = "Id is not a number", body = ErrorResponse),
        (status = 404, description = "No product with this id", body = ErrorResponse)
    )
)]
pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.store.find_by_id(id).await {
        Ok(Some(product)) => (StatusCode::OK, Json(ProductResponse::from(&product))).into_response(),
        Ok(None) => not_found(id),
        Err(e) => errors::store_error_to_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/products/categories/{name}",
    tag = "products",
    params(("name" = String, Path, description = "Exact, case-sensitive category name")),
    responses(
        (status = 200, description = "Products in the category", body = [ProductResponse]),
        (status = 404, description = "No product in this category", body = ErrorResponse)
    )
)]
pub async fn list_by_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    match services.store.find_by_category(&name).await {
        Ok(products) if products.is_empty() => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no products in category {name}"),
        ),
        Ok(products) => (StatusCode::OK, Json(dto::products_to_json(&products))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Malformed body or negative quantity", body = ErrorResponse)
    )
)]
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<ProductRequest>,
) -> axum::response::Response {
    match services.store.insert(ProductDraft::from(body)).await {
        Ok(product) => {
            tracing::info!(product_id = %product.id(), "product created");
            (StatusCode::CREATED, Json(ProductResponse::from(&product))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

#[utoipa::path(
    put,
    path = "/products/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product replaced", body = ProductResponse),
        (status = 400, description = "Malformed id, body or negative quantity", body = ErrorResponse),
        (status = 404, description = "No product with this id", body = ErrorResponse)
    )
)]
pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ProductRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.store.update(id, ProductDraft::from(body)).await {
        Ok(Some(product)) => (StatusCode::OK, Json(ProductResponse::from(&product))).into_response(),
        Ok(None) => not_found(id),
        Err(e) => errors::store_error_to_response(e),
    }
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, description = "Id is not a number", body = ErrorResponse),
        (status = 404, description = "No product with this id", body = ErrorResponse)
    )
)]
pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.store.delete(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(id),
        Err(e) => errors::store_error_to_response(e),
    }
}

fn parse_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse::<ProductId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"))
}

fn not_found(id: ProductId) -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("product {id} not found"))
}
