//! Request-scoped error types for the panelflow API.
//!
//! Two failure classes cross the HTTP boundary: a payload the caller got
//! wrong (4xx, machine-readable reason) and a store we could not reach
//! (5xx, detail kept server-side). Startup failures use `anyhow` in
//! `main.rs` instead and abort the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum ApiError {
    /// Body was not a JSON object, or a client-authoritative timestamp
    /// failed to parse against the fixed format.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Connection or statement failure against PostgreSQL. Never retried
    /// here; the device or operator owns the retry decision.
    #[error("store unavailable: {0}")]
    Store(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        match self {
            ApiError::InvalidPayload(detail) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid_payload", "detail": detail})),
            )
                .into_response(),
            ApiError::Store(e) => {
                // Driver detail can carry connection info; log it, keep it
                // out of the body.
                tracing::error!("store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "store_unavailable"})),
                )
                    .into_response()
            }
        }
    }
}
