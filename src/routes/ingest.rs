// src/routes/ingest.rs
//! Ingestion endpoint: `POST /measurements`.
//!
//! Validates and normalizes one inbound reading, resolves its device and
//! capture time under the deployment policy, and appends exactly one row.
//! A rejected payload produces no partial row; a store failure surfaces
//! as a 5xx and the write is not retried here (at-most-once — retry is
//! the device's responsibility).

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::error::ApiError;
use crate::{store, Config, IngestPayload};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/measurements", post(handler))
}

/// JSON response body for a successful ingest.
#[derive(Serialize)]
struct IngestResponse {
    status: &'static str,
    device: String,
    id: i64,
}

async fn handler(
    State((pool, config)): State<(PgPool, Config)>,
    payload: Result<Json<IngestPayload>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    // ---
    // Anything that is not a JSON object is the caller's problem, not ours.
    let Json(payload) = payload.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;

    let device = payload.resolve_device(&config.default_device);
    let captured_at =
        payload.resolve_captured_at(config.timestamp_mode, config.reference_tz)?;

    let mut channels = payload.channels;
    if config.backfill_primary {
        channels.backfill_primary();
    }

    let id = store::insert(&pool, &device, captured_at, &channels).await?;
    info!("POST /measurements - stored id={} device={}", id, device);

    Ok(Json(IngestResponse {
        status: "ok",
        device,
        id,
    }))
}
