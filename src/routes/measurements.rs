// src/routes/measurements.rs
//! Retrieval endpoint: `GET /measurements`.
//!
//! Serves both access patterns behind one route:
//! - snapshot: `?device=&limit=` — the most recent rows for a device,
//! - incremental: `?device=&sinceId=&limit=` — rows after a cursor.
//!
//! Both respond ascending by `id` (oldest first) so pollers never re-sort;
//! `id` is the single chronological source of truth, the wall-clock fields
//! in each row are display-only. An unknown device yields an empty array,
//! not an error.

use axum::{extract::Query, extract::State, routing::get, Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::debug;

use crate::error::ApiError;
use crate::models::normalize_device;
use crate::{store, Config, MeasurementView};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/measurements", get(handler))
}

/// Query parameters shared by snapshot and incremental fetches.
#[derive(Debug, Deserialize)]
struct MeasurementsQuery {
    device: Option<String>,
    #[serde(rename = "sinceId")]
    since_id: Option<i64>,
    limit: Option<u32>,
}

async fn handler(
    Query(params): Query<MeasurementsQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> Result<Json<Vec<MeasurementView>>, ApiError> {
    // ---
    let device = normalize_device(params.device.as_deref(), &config.default_device);
    let limit = store::clamp_limit(params.limit, config.default_limit, config.max_limit);

    let rows = match params.since_id {
        Some(since_id) => store::since(&pool, &device, since_id, limit).await?,
        None => store::snapshot(&pool, &device, limit).await?,
    };

    debug!(
        "GET /measurements device={} since_id={:?} rows={}",
        device,
        params.since_id,
        rows.len()
    );

    let views = rows
        .into_iter()
        .map(|row| row.into_view(config.reference_tz))
        .collect();
    Ok(Json(views))
}
