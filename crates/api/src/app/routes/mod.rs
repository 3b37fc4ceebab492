use axum::Router;

pub mod products;
pub mod stock;
pub mod system;

/// Router for the product catalog and stock adjustment endpoints.
pub fn router() -> Router {
    Router::new().nest("/products", products::router().merge(stock::router()))
}
