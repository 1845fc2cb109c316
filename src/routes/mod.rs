use axum::Router;
use sqlx::PgPool;

use crate::Config;

mod export_csv;
mod health;
mod ingest;
mod measurements;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    Router::new()
        .merge(ingest::router())
        .merge(measurements::router())
        .merge(export_csv::router())
        .merge(health::router())
        .with_state((pool, config))
}
