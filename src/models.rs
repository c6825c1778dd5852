//! Data models for the import pipeline.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::coerce;

// ---

/// Lifecycle of an [`Import`]. `Processing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    // ---
    Processing,
    Full,
    Partial,
    Duplicate,
    Error,
}

impl ImportStatus {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            ImportStatus::Processing => "processing",
            ImportStatus::Full => "full",
            ImportStatus::Partial => "partial",
            ImportStatus::Duplicate => "duplicate",
            ImportStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ImportStatus::Processing)
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s {
            "processing" => Ok(ImportStatus::Processing),
            "full" => Ok(ImportStatus::Full),
            "partial" => Ok(ImportStatus::Partial),
            "duplicate" => Ok(ImportStatus::Duplicate),
            "error" => Ok(ImportStatus::Error),
            other => Err(format!("unknown import status '{}'", other)),
        }
    }
}

/// One ingestion attempt, as stored.
#[derive(Debug, Clone, Serialize)]
pub struct Import {
    // ---
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub content_hash: String,
    #[serde(skip_serializing)]
    pub raw_content: Value,
    pub source: String,
    pub expected_item_count: i32,
    pub status: ImportStatus,
    pub error_message: Option<String>,
}

/// Fields supplied by the ingestion endpoint when creating an [`Import`].
/// The store assigns `id` and `received_at`; status starts at `processing`.
#[derive(Debug, Clone)]
pub struct NewImport {
    // ---
    pub content_hash: String,
    pub raw_content: Value,
    pub source: String,
    pub expected_item_count: i32,
}

/// An accepted location sample.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: Uuid,
    pub pet_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: String,
    pub battery_status: Option<Value>,
    pub is_inaccurate: bool,
    pub location_hash: String,
    pub import_id: Uuid,
}

/// A [`Reading`] before the store has assigned its id.
#[derive(Debug, Clone)]
pub struct NewReading {
    // ---
    pub pet_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: String,
    pub battery_status: Option<Value>,
    pub is_inaccurate: bool,
    pub location_hash: String,
    pub import_id: Uuid,
}

impl NewReading {
    // ---
    pub fn into_reading(self, id: Uuid) -> Reading {
        // ---
        Reading {
            id,
            pet_name: self.pet_name,
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            timestamp: self.timestamp,
            battery_status: self.battery_status,
            is_inaccurate: self.is_inaccurate,
            location_hash: self.location_hash,
            import_id: self.import_id,
        }
    }
}

/// The `location` object of a device item, after best-effort coercion.
///
/// Latitude and longitude stay `None` when missing or not numeric so the
/// coordinate check can tell them apart from a genuine `0.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLocation {
    // ---
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub horizontal_accuracy: f64,
    pub is_inaccurate: bool,
    pub time_stamp: Option<Value>,
}

impl RawLocation {
    // ---
    /// Read a `location` object. Returns `None` if `value` is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        // ---
        let obj = value.as_object()?;
        Some(RawLocation {
            latitude: obj.get("latitude").and_then(coerce::as_f64),
            longitude: obj.get("longitude").and_then(coerce::as_f64),
            horizontal_accuracy: obj
                .get("horizontalAccuracy")
                .and_then(coerce::as_f64)
                .unwrap_or(0.0),
            is_inaccurate: obj
                .get("isInaccurate")
                .and_then(coerce::as_bool)
                .unwrap_or(false),
            time_stamp: obj.get("timeStamp").filter(|v| !v.is_null()).cloned(),
        })
    }

    /// Both coordinates, when present and not NaN.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        // ---
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if !lat.is_nan() && !lon.is_nan() => Some((lat, lon)),
            _ => None,
        }
    }
}
