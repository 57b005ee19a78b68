use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use crate::app::{SharedEngine, dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(create_transaction).get(list_transactions))
}

pub async fn create_transaction(
    Extension(engine): Extension<SharedEngine>,
    Json(body): Json<dto::CreateTransactionRequest>,
) -> axum::response::Response {
    let request = match body.into_movement() {
        Ok(v) => v,
        Err(res) => return res,
    };

    match engine.apply_transaction(request).await {
        Ok(tx) => (StatusCode::CREATED, Json(tx)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// `product_id` narrows the listing to one product.
pub async fn list_transactions(
    Extension(engine): Extension<SharedEngine>,
    Query(range): Query<dto::DateRangeQuery>,
    Query(filter): Query<dto::ProductFilterQuery>,
) -> axum::response::Response {
    let window = match range.window() {
        Ok(w) => w,
        Err(res) => return res,
    };

    let listed = match filter.product_id.as_deref() {
        Some(raw) => match dto::parse_product_id(raw) {
            Ok(id) => engine.list_product_transactions(id, window).await,
            Err(res) => return res,
        },
        None => engine.list_transactions(window).await,
    };

    match listed {
        Ok(txs) => (StatusCode::OK, Json(txs)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
