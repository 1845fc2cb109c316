//! Database schema management for panelflow.
//!
//! Ensures the measurements table and every known metric column exist
//! before serving requests. Applied once on startup from `main.rs`; a
//! failure here is fatal so the process never accepts traffic against an
//! unverified schema.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::CHANNEL_NAMES;

// ---

/// Create or extend the measurements schema (idempotent, additive only).
///
/// The table create no-ops when present, and each metric gets its own
/// `ADD COLUMN IF NOT EXISTS`, so a deployment that predates a metric
/// picks it up without dropping or rewriting existing rows. Safe to
/// re-run and to race with an already-running instance.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Append-only log: id is the only trustworthy ordering key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS measurements (
            id          BIGSERIAL   PRIMARY KEY,
            device      TEXT        NOT NULL,
            captured_at TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Names come from a compile-time constant, safe to splice into SQL.
    for metric in CHANNEL_NAMES {
        sqlx::query(&format!(
            "ALTER TABLE measurements ADD COLUMN IF NOT EXISTS {metric} DOUBLE PRECISION;"
        ))
        .execute(&mut *tx)
        .await?;
    }

    // Per-device snapshot and cursor queries both scan (device, id).
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_measurements_device_id
            ON measurements (device, id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn channel_names_are_unique_plain_identifiers() {
        // ---
        // Guards the format! splice in ensure_schema.
        let unique: HashSet<_> = CHANNEL_NAMES.iter().collect();
        assert_eq!(unique.len(), CHANNEL_NAMES.len());

        for name in CHANNEL_NAMES {
            assert!(!name.is_empty());
            assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }
}
