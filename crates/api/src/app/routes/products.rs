use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::app::{SharedEngine, dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route(
            "/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route("/:id/reconcile", post(reconcile_stock))
}

pub async fn create_product(
    Extension(engine): Extension<SharedEngine>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    match engine.create_product(body.into()).await {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_products(Extension(engine): Extension<SharedEngine>) -> axum::response::Response {
    match engine.list_products().await {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(engine): Extension<SharedEngine>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match engine.get_product(id).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn update_product(
    Extension(engine): Extension<SharedEngine>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProductRequest>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match engine.update_product(id, body.into()).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(engine): Extension<SharedEngine>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match engine.delete_product(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn reconcile_stock(
    Extension(engine): Extension<SharedEngine>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReconcileRequest>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match engine
        .reconcile_stock(id, body.counted_quantity, &body.description)
        .await
    {
        Ok(recorded) => (
            StatusCode::OK,
            Json(serde_json::json!({ "transaction": recorded })),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
