// src/routes/export_csv.rs
//! CSV export endpoint: `GET /measurements/csv`.
//!
//! Full-history download path for the dashboard's CSV button. Separate
//! from the windowed snapshot: it runs with its own, much higher limit
//! cap so a chart window never truncates an export. The body is streamed
//! line by line from a lazy row stream, so a client that drops the
//! connection mid-download stops the fetch promptly. With no `device`
//! filter the devices interleave in global `id` order.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{extract::Query, extract::State, routing::get, Router};
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::error::ApiError;
use crate::{csv, store, Config};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/measurements/csv", get(handler))
}

#[derive(Debug, Deserialize)]
struct CsvQuery {
    device: Option<String>,
    limit: Option<u32>,
}

async fn handler(
    Query(params): Query<CsvQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> Result<Response, ApiError> {
    // ---
    // Unlike the snapshot path, an omitted device means "every device",
    // so only normalize when a filter was actually supplied.
    let device = params
        .device
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_lowercase);

    let limit = store::clamp_limit(params.limit, config.csv_max_limit, config.csv_max_limit);

    // An unreachable store must surface as a clean 5xx, not as a broken
    // 200 body, so verify connectivity before committing to the stream.
    store::ping(&pool).await?;
    info!("GET /measurements/csv device={:?} limit={}", device, limit);

    let reference_tz = config.reference_tz;
    let rows = store::export_stream(pool, device.clone(), limit);

    let header_line =
        futures::stream::once(async { Ok::<String, sqlx::Error>(format!("{}\n", csv::header())) });
    let lines = rows.map(move |item| {
        item.map(|row| format!("{}\n", csv::render_row(&row.into_view(reference_tz))))
    });
    let body = Body::from_stream(header_line.chain(lines));

    let stamp = Utc::now()
        .with_timezone(&config.reference_tz)
        .format("%Y-%m-%d_%H%M");
    let filename = match &device {
        Some(device) => format!("esp32_{device}_{stamp}.csv"),
        None => format!("esp32_todo_{stamp}.csv"),
    };

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
