//! Read/write access to the measurements table.
//!
//! Every function takes the pool by reference and runs a single bounded
//! statement; a connection is checked out per call and released on every
//! exit path. Inserts rely on the store's row-insert atomicity and the
//! `BIGSERIAL` identity column for collision-free id assignment, so no
//! application-level locking exists anywhere in this module.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::models::{Channels, Measurement};

// ---

const SELECT_COLS: &str = "id, device, captured_at, \
     voltaje, corriente, potencia, radiometro, temperatura, \
     voltaje1, voltaje2, voltaje3, \
     corriente1, corriente2, corriente3, \
     potencia1, potencia2, potencia3";

/// Clamp a requested row count to the configured maximum.
///
/// Bounds per-request work; this is the only backpressure the subsystem
/// applies.
pub fn clamp_limit(requested: Option<u32>, default: u32, max: u32) -> i64 {
    // ---
    i64::from(requested.unwrap_or(default).min(max))
}

/// Append one measurement and return the store-assigned id.
pub async fn insert(
    pool: &PgPool,
    device: &str,
    captured_at: DateTime<Utc>,
    channels: &Channels,
) -> Result<i64, sqlx::Error> {
    // ---
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO measurements (
            device, captured_at,
            voltaje, corriente, potencia, radiometro, temperatura,
            voltaje1, voltaje2, voltaje3,
            corriente1, corriente2, corriente3,
            potencia1, potencia2, potencia3
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING id
        "#,
    )
    .bind(device)
    .bind(captured_at)
    .bind(channels.voltaje)
    .bind(channels.corriente)
    .bind(channels.potencia)
    .bind(channels.radiometro)
    .bind(channels.temperatura)
    .bind(channels.voltaje1)
    .bind(channels.voltaje2)
    .bind(channels.voltaje3)
    .bind(channels.corriente1)
    .bind(channels.corriente2)
    .bind(channels.corriente3)
    .bind(channels.potencia1)
    .bind(channels.potencia2)
    .bind(channels.potencia3)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Most recent `limit` rows for one device, returned ascending by id.
///
/// The storage layer fetches newest-first so the limit bites on recent
/// rows, then the batch is reversed: callers always see oldest-first and
/// never have to re-sort.
pub async fn snapshot(
    pool: &PgPool,
    device: &str,
    limit: i64,
) -> Result<Vec<Measurement>, sqlx::Error> {
    // ---
    let mut rows: Vec<Measurement> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLS} FROM measurements \
         WHERE device = $1 ORDER BY id DESC LIMIT $2"
    ))
    .bind(device)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.reverse();
    Ok(rows)
}

/// Rows with `id > since_id` for one device, ascending, capped at `limit`.
///
/// An unknown device or an up-to-date cursor both yield an empty vec.
pub async fn since(
    pool: &PgPool,
    device: &str,
    since_id: i64,
    limit: i64,
) -> Result<Vec<Measurement>, sqlx::Error> {
    // ---
    sqlx::query_as(&format!(
        "SELECT {SELECT_COLS} FROM measurements \
         WHERE device = $1 AND id > $2 ORDER BY id ASC LIMIT $3"
    ))
    .bind(device)
    .bind(since_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Row stream for the CSV export path: all matching rows ascending by id.
///
/// With no device filter the devices interleave in global id order, which
/// is the defined cross-device chronology. Rows are fetched lazily on a
/// spawned task and handed over a bounded channel: when the receiver side
/// is dropped (the client went away mid-download) the next send fails and
/// the task stops fetching promptly instead of draining the query.
pub fn export_stream(
    pool: PgPool,
    device: Option<String>,
    limit: i64,
) -> ReceiverStream<Result<Measurement, sqlx::Error>> {
    // ---
    let (tx, rx) = mpsc::channel::<Result<Measurement, sqlx::Error>>(64);

    tokio::spawn(async move {
        let sql = match &device {
            Some(_) => format!(
                "SELECT {SELECT_COLS} FROM measurements \
                 WHERE device = $1 ORDER BY id ASC LIMIT $2"
            ),
            None => format!("SELECT {SELECT_COLS} FROM measurements ORDER BY id ASC LIMIT $1"),
        };
        let mut rows = match &device {
            Some(device) => sqlx::query_as::<_, Measurement>(&sql)
                .bind(device.clone())
                .bind(limit)
                .fetch(&pool),
            None => sqlx::query_as::<_, Measurement>(&sql).bind(limit).fetch(&pool),
        };

        while let Some(item) = rows.next().await {
            // A store error ends the stream after it is reported.
            let failed = item.is_err();
            if tx.send(item).await.is_err() || failed {
                break;
            }
        }
    });

    ReceiverStream::new(rx)
}

/// One round trip to verify store connectivity, used by `/health`.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
