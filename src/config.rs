//! Configuration loader for the panelflow backend service.
//!
//! Centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Consolidating configuration here keeps
//! `env::var` calls out of the rest of the codebase and gives every
//! request handler one immutable snapshot for the process lifetime.

use std::env;

use anyhow::{anyhow, bail, Result};
use chrono::FixedOffset;

// ---

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

// ---

/// Timestamp resolution policy, fixed per deployment. Never mixed per-row:
/// a deployment is either server-authoritative or client-authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampMode {
    /// Ignore client time, stamp with server receipt time.
    Server,
    /// Require a parseable client local-time string, reject otherwise.
    Client,
}

impl std::str::FromStr for TimestampMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        // ---
        match s.trim().to_lowercase().as_str() {
            "server" => Ok(TimestampMode::Server),
            "client" => Ok(TimestampMode::Client),
            other => bail!("TIMESTAMP_MODE must be 'server' or 'client', got {other:?}"),
        }
    }
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Device identifier used when a payload or query names none.
    pub default_device: String,

    /// Deployment-wide timestamp resolution policy.
    pub timestamp_mode: TimestampMode,

    /// Reference offset for display fields and client-time parsing.
    pub reference_tz: FixedOffset,

    /// Snapshot row count when the caller sends no `limit`.
    pub default_limit: u32,

    /// Hard cap for snapshot/incremental `limit` values.
    pub max_limit: u32,

    /// Hard cap for the full-history CSV export path.
    pub csv_max_limit: u32,

    /// Backfill primary channels from channel 1 (legacy reader shim).
    pub backfill_primary: bool,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `DEFAULT_DEVICE` – fallback device id (default: `s2`)
/// - `TIMESTAMP_MODE` – `server` or `client` (default: `server`)
/// - `TZ_OFFSET_HOURS` – reference UTC offset in hours (default: -6)
/// - `DEFAULT_LIMIT` / `MAX_LIMIT` – snapshot sizing (default: 300 / 5000)
/// - `CSV_MAX_LIMIT` – export sizing (default: 100000)
/// - `BACKFILL_PRIMARY` – `1|true|yes` to enable the channel-1 shim
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);

    let default_device = env::var("DEFAULT_DEVICE")
        .unwrap_or_else(|_| "s2".to_string())
        .trim()
        .to_lowercase();
    if default_device.is_empty() {
        bail!("DEFAULT_DEVICE must not be blank");
    }

    let timestamp_mode = env::var("TIMESTAMP_MODE")
        .unwrap_or_else(|_| "server".to_string())
        .parse::<TimestampMode>()?;

    let tz_offset_hours = env::var("TZ_OFFSET_HOURS")
        .ok()
        .map(|v| v.parse::<i32>())
        .transpose()
        .map_err(|e| anyhow!("Invalid TZ_OFFSET_HOURS: {}", e))?
        .unwrap_or(-6);
    let reference_tz = reference_tz_from_hours(tz_offset_hours)?;

    let default_limit = parse_env_u32!("DEFAULT_LIMIT", 300);
    let max_limit = parse_env_u32!("MAX_LIMIT", 5000);
    let csv_max_limit = parse_env_u32!("CSV_MAX_LIMIT", 100_000);

    let backfill_primary = matches!(
        env::var("BACKFILL_PRIMARY").as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    );

    Ok(Config {
        db_url,
        db_pool_max,
        default_device,
        timestamp_mode,
        reference_tz,
        default_limit,
        max_limit,
        csv_max_limit,
        backfill_primary,
    })
}

/// Build the reference offset from whole hours, rejecting anything
/// outside the real-world UTC offset range of ±14. The range check runs
/// before the seconds multiplication, so an absurd env value errors out
/// instead of overflowing.
fn reference_tz_from_hours(hours: i32) -> Result<FixedOffset> {
    // ---
    if !(-14..=14).contains(&hours) {
        bail!("TZ_OFFSET_HOURS must be within -14..=14, got {hours}");
    }
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| anyhow!("TZ_OFFSET_HOURS out of range: {}", hours))
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the database password while showing every other value.
    pub fn log_config(&self) {
        // ---
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL     : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX      : {}", self.db_pool_max);
        tracing::info!("  DEFAULT_DEVICE   : {}", self.default_device);
        tracing::info!("  TIMESTAMP_MODE   : {:?}", self.timestamp_mode);
        tracing::info!("  REFERENCE_TZ     : {}", self.reference_tz);
        tracing::info!("  DEFAULT_LIMIT    : {}", self.default_limit);
        tracing::info!("  MAX_LIMIT        : {}", self.max_limit);
        tracing::info!("  CSV_MAX_LIMIT    : {}", self.csv_max_limit);
        tracing::info!("  BACKFILL_PRIMARY : {}", self.backfill_primary);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn timestamp_mode_parses_both_policies() {
        // ---
        assert_eq!(
            " Server ".parse::<TimestampMode>().unwrap(),
            TimestampMode::Server
        );
        assert_eq!(
            "client".parse::<TimestampMode>().unwrap(),
            TimestampMode::Client
        );
        assert!("per-row".parse::<TimestampMode>().is_err());
    }

    #[test]
    fn reference_offset_is_bounded_to_real_utc_offsets() {
        // ---
        assert!(reference_tz_from_hours(0).is_ok());
        assert!(reference_tz_from_hours(-6).is_ok());
        assert!(reference_tz_from_hours(14).is_ok());
        assert!(reference_tz_from_hours(-14).is_ok());

        assert!(reference_tz_from_hours(15).is_err());
        assert!(reference_tz_from_hours(-15).is_err());
        assert!(reference_tz_from_hours(20).is_err());
        // Checked before the multiply, so no overflow either.
        assert!(reference_tz_from_hours(i32::MAX).is_err());
    }
}
