use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::timestamp;

/// A persisted sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub id: i64,

    pub sensor_id: Option<String>,

    pub event_type: Option<String>,

    pub fill_number: Option<i32>,

    pub accelerator: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub value: Option<f64>,
}

/// Ingest request body. `timestamp` may be omitted and is then assigned at ingestion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTelemetryEvent {
    #[serde(default)]
    pub sensor_id: Option<String>,

    #[serde(default)]
    pub event_type: Option<String>,

    #[serde(default)]
    pub fill_number: Option<i32>,

    #[serde(default)]
    pub accelerator: Option<String>,

    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub value: Option<f64>,
}

/// A reading that is ready to be queued and saved: the timestamp is always set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTelemetryEvent {
    pub sensor_id: Option<String>,
    pub event_type: Option<String>,
    pub fill_number: Option<i32>,
    pub accelerator: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

impl CreateTelemetryEvent {
    /// Keeps a client-supplied timestamp, otherwise stamps the reading with `received_at`.
    pub fn into_new(self, received_at: DateTime<Utc>) -> NewTelemetryEvent {
        NewTelemetryEvent {
            sensor_id: self.sensor_id,
            event_type: self.event_type,
            fill_number: self.fill_number,
            accelerator: self.accelerator,
            timestamp: self.timestamp.unwrap_or(received_at),
            value: self.value,
        }
    }
}

const UNKNOWN: &str = "unknown";

impl NewTelemetryEvent {
    /// Sensor id for log lines; absent ids print as `unknown`.
    pub fn sensor_label(&self) -> &str {
        self.sensor_id.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn event_type_label(&self) -> &str {
        self.event_type.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn with_id(self, id: i64) -> TelemetryEvent {
        TelemetryEvent {
            id,
            sensor_id: self.sensor_id,
            event_type: self.event_type,
            fill_number: self.fill_number,
            accelerator: self.accelerator,
            timestamp: self.timestamp,
            value: self.value,
        }
    }
}
