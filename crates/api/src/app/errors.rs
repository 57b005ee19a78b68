use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use depot_core::DomainError;
use depot_infra::EngineError;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::InvalidArgument(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_argument", msg),
        EngineError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        e @ EngineError::InsufficientStock { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", e.to_string())
        }
        EngineError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        EngineError::StorageUnavailable => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_unavailable",
            "storage unavailable",
        ),
        EngineError::Cancelled => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "cancelled",
            "request deadline exceeded",
        ),
        EngineError::Internal => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal error",
        ),
    }
}

/// Request-shape errors caught before the engine is called.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    engine_error_to_response(err.into())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_argument", message)
}
