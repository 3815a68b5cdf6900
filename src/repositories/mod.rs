pub mod memory_repository;
pub mod telemetry_repository;

pub use memory_repository::InMemoryTelemetryRepository;
pub use telemetry_repository::PgTelemetryRepository;

use async_trait::async_trait;

use crate::models::{NewTelemetryEvent, TelemetryEvent};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Ordering of `find_all` by event timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Durable store for telemetry events. Implementations must accept concurrent
/// `save` calls from independent workers without external locking.
#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Validates and persists one event, returning it with its assigned id.
    async fn save(&self, event: &NewTelemetryEvent) -> RepositoryResult<TelemetryEvent>;

    async fn find_all(&self, direction: SortDirection) -> RepositoryResult<Vec<TelemetryEvent>>;

    /// Exact match on sensor id, in insertion order.
    async fn find_by_sensor_id(&self, sensor_id: &str) -> RepositoryResult<Vec<TelemetryEvent>>;

    async fn delete_all(&self) -> RepositoryResult<()>;
}

pub(crate) fn validate(event: &NewTelemetryEvent) -> RepositoryResult<()> {
    match event.value {
        Some(value) if value.is_nan() || value < 0.0 => Err(RepositoryError::Validation(
            "Beam intensity cannot be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(value: Option<f64>) -> NewTelemetryEvent {
        NewTelemetryEvent {
            sensor_id: Some("S1".to_string()),
            event_type: Some("BEAM_LOSS".to_string()),
            fill_number: None,
            accelerator: None,
            timestamp: Utc::now(),
            value,
        }
    }

    #[test]
    fn test_validate_value() {
        assert!(validate(&event(None)).is_ok());
        assert!(validate(&event(Some(0.0))).is_ok());
        assert!(validate(&event(Some(12.5))).is_ok());
        assert!(matches!(
            validate(&event(Some(-3.0))),
            Err(RepositoryError::Validation(_))
        ));
    }
}
