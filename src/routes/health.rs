// src/routes/health.rs
//! API health check endpoint for the panelflow backend.
//!
//! Defines the `/health` route used by container orchestrators and CI
//! pipelines. This probe verifies store connectivity with one `SELECT 1`
//! round trip rather than bare process liveness: a schema-verified
//! process that has lost its database must read as unhealthy, because
//! every other endpoint would fail too.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;

use crate::{store, Config};

// ---

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Handle `GET /health`.
async fn health(
    State((pool, _config)): State<(PgPool, Config)>,
) -> (StatusCode, Json<HealthResponse>) {
    // ---
    match store::ping(&pool).await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
        }
    }
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/health", get(health))
}
