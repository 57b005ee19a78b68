//! HTTP API application wiring (Axum router + engine wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs and query parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use depot_infra::{InventoryEngine, LedgerStore};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Engine as shared by all handlers; the backing store is chosen at startup.
pub type SharedEngine = Arc<InventoryEngine<Arc<dyn LedgerStore>>>;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(engine: SharedEngine) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_log))
                .layer(Extension(engine)),
        )
}
