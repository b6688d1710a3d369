use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;

use crate::error::error_details_exposed;

/// Convert a downstream panic into a generic JSON 500.
///
/// Used with `tower_http::catch_panic::CatchPanicLayer::custom`. Panic detail
/// is logged with the active request span and only serialized to the caller
/// when the service exposes error details (non-production modes).
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Unhandled panic in request handler");

    let body = if error_details_exposed() {
        json!({ "error": "Internal server error", "details": detail })
    } else {
        json!({ "error": "Internal server error" })
    };

    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
