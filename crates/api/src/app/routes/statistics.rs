use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::{SharedEngine, dto, errors};

pub async fn get_statistics(
    Extension(engine): Extension<SharedEngine>,
    Query(range): Query<dto::DateRangeQuery>,
) -> axum::response::Response {
    let window = match range.window() {
        Ok(w) => w,
        Err(res) => return res,
    };

    match engine.compute_statistics(window).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
