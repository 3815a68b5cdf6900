pub mod telemetry_event;
pub mod timestamp;

pub use telemetry_event::{CreateTelemetryEvent, NewTelemetryEvent, TelemetryEvent};
