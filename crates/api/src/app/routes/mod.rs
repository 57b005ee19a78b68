use axum::{Router, routing::get};

pub mod products;
pub mod statistics;
pub mod system;
pub mod transactions;

/// Router for all resource endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/transactions", transactions::router())
        .route("/statistics", get(statistics::get_statistics))
}
