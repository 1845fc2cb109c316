//! Data model for panel telemetry measurements.
//!
//! A measurement is one append-only row: a store-assigned `id`, a resolved
//! `device`, a UTC capture time, and a sparse set of metric channels. The
//! channel set is the superset of every metric any firmware revision has
//! reported; a given reading populates only the subset its device knows
//! about (the S2 reports the primary panel channels plus radiometer and
//! temperature, the WROOM reports three numbered channel groups).

use chrono::{DateTime, FixedOffset, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::TimestampMode;
use crate::error::ApiError;

// ---

/// Every metric column the store knows about, in canonical column order.
///
/// Shared by the schema manager (one additive `ADD COLUMN IF NOT EXISTS`
/// per entry) and the CSV header. Order here is the order everywhere.
pub const CHANNEL_NAMES: [&str; 14] = [
    "voltaje",
    "corriente",
    "potencia",
    "radiometro",
    "temperatura",
    "voltaje1",
    "voltaje2",
    "voltaje3",
    "corriente1",
    "corriente2",
    "corriente3",
    "potencia1",
    "potencia2",
    "potencia3",
];

/// Fixed wire format for client-authoritative timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---

/// Sparse channel values for one measurement. Absent metrics are `None`
/// and stay NULL in the store, never zero.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channels {
    // ---
    #[serde(default, deserialize_with = "lenient_channel")]
    pub voltaje: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub corriente: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub potencia: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub radiometro: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub temperatura: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub voltaje1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub voltaje2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub voltaje3: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub corriente1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub corriente2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub corriente3: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub potencia1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub potencia2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_channel")]
    pub potencia3: Option<f64>,
}

impl Channels {
    /// Values in [`CHANNEL_NAMES`] order.
    pub fn values(&self) -> [Option<f64>; 14] {
        // ---
        [
            self.voltaje,
            self.corriente,
            self.potencia,
            self.radiometro,
            self.temperatura,
            self.voltaje1,
            self.voltaje2,
            self.voltaje3,
            self.corriente1,
            self.corriente2,
            self.corriente3,
            self.potencia1,
            self.potencia2,
            self.potencia3,
        ]
    }

    /// Compatibility shim for legacy single-channel WROOM readers: when a
    /// primary channel is absent but its channel-1 counterpart is present,
    /// copy channel 1 into the primary. Only applied when the deployment
    /// opts in via `BACKFILL_PRIMARY`.
    pub fn backfill_primary(&mut self) {
        // ---
        if self.voltaje.is_none() {
            self.voltaje = self.voltaje1;
        }
        if self.corriente.is_none() {
            self.corriente = self.corriente1;
        }
        if self.potencia.is_none() {
            self.potencia = self.potencia1;
        }
    }
}

/// Lenient per-field numeric decode: JSON numbers pass through, strings
/// parse in decimal notation (accepting the firmware's comma separator),
/// anything else becomes `None`. A bad value never fails the field, so one
/// malformed metric cannot reject an otherwise-valid reading.
fn lenient_channel<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(coerce_f64(&raw))
}

fn coerce_f64(raw: &Value) -> Option<f64> {
    // ---
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Trim, lower-case, and default a device identifier.
pub fn normalize_device(raw: Option<&str>, default_device: &str) -> String {
    // ---
    match raw.map(str::trim) {
        Some(d) if !d.is_empty() => d.to_lowercase(),
        _ => default_device.to_string(),
    }
}

// ---

/// Inbound ingest payload. Unknown keys are ignored; recognized metric
/// keys decode leniently via [`Channels`].
#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    // ---
    pub device: Option<String>,
    #[serde(default, alias = "fecha_hora", deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub channels: Channels,
}

/// Lenient timestamp decode: a non-string value must not abort the whole
/// record, because server-authoritative deployments ignore client time
/// entirely. Non-strings are carried as their JSON rendering so client
/// mode still rejects them with the value in the error message.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl IngestPayload {
    // ---
    pub fn resolve_device(&self, default_device: &str) -> String {
        normalize_device(self.device.as_deref(), default_device)
    }

    /// Resolve the capture time under the deployment's timestamp policy.
    ///
    /// Server-authoritative: the client field is ignored and the reading is
    /// stamped with the server's current time, truncated to whole seconds.
    /// Client-authoritative: the `timestamp` string must parse against
    /// [`TIMESTAMP_FORMAT`] in the reference offset; a missing or
    /// unparseable value rejects the whole request. The two modes are never
    /// mixed within one deployment.
    pub fn resolve_captured_at(
        &self,
        mode: TimestampMode,
        reference_tz: FixedOffset,
    ) -> Result<DateTime<Utc>, ApiError> {
        // ---
        match mode {
            TimestampMode::Server => Ok(Utc::now().trunc_subsecs(0)),
            TimestampMode::Client => {
                let raw = self.timestamp.as_deref().ok_or_else(|| {
                    ApiError::InvalidPayload("missing timestamp in client mode".into())
                })?;
                let naive = NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
                    .map_err(|e| ApiError::InvalidPayload(format!("bad timestamp {raw:?}: {e}")))?;
                let local = naive
                    .and_local_timezone(reference_tz)
                    .single()
                    .ok_or_else(|| {
                        ApiError::InvalidPayload(format!("ambiguous timestamp {raw:?}"))
                    })?;
                Ok(local.with_timezone(&Utc))
            }
        }
    }
}

// ---

/// One stored measurement as read back from the store.
#[derive(Debug, sqlx::FromRow)]
pub struct Measurement {
    // ---
    pub id: i64,
    pub device: String,
    pub captured_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub channels: Channels,
}

/// API/CSV view of a measurement. `fecha` and `hora` are rendered in the
/// reference timezone for display only; `id` remains the ordering key.
#[derive(Debug, Serialize)]
pub struct MeasurementView {
    // ---
    pub id: i64,
    pub device: String,
    pub fecha: String,
    pub hora: String,
    #[serde(flatten)]
    pub channels: Channels,
}

impl Measurement {
    pub fn into_view(self, reference_tz: FixedOffset) -> MeasurementView {
        // ---
        let local = self.captured_at.with_timezone(&reference_tz);
        MeasurementView {
            id: self.id,
            device: self.device,
            fecha: local.format("%Y-%m-%d").to_string(),
            hora: local.format("%H:%M:%S").to_string(),
            channels: self.channels,
        }
    }
}
