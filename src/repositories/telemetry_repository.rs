use async_trait::async_trait;
use sqlx::PgPool;

use super::{validate, RepositoryResult, SortDirection, TelemetryRepository};
use crate::models::{NewTelemetryEvent, TelemetryEvent};

#[derive(Clone)]
pub struct PgTelemetryRepository {
    pool: PgPool,
}

impl PgTelemetryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TelemetryRepository for PgTelemetryRepository {
    async fn save(&self, event: &NewTelemetryEvent) -> RepositoryResult<TelemetryEvent> {
        validate(event)?;

        let saved = sqlx::query_as::<_, TelemetryEvent>(
            "INSERT INTO telemetry_events (sensor_id, event_type, fill_number, accelerator, timestamp, value)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(&event.sensor_id)
        .bind(&event.event_type)
        .bind(event.fill_number)
        .bind(&event.accelerator)
        .bind(event.timestamp)
        .bind(event.value)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    async fn find_all(&self, direction: SortDirection) -> RepositoryResult<Vec<TelemetryEvent>> {
        let sql = match direction {
            SortDirection::Descending => {
                "SELECT * FROM telemetry_events ORDER BY timestamp DESC, id DESC"
            }
            SortDirection::Ascending => "SELECT * FROM telemetry_events ORDER BY timestamp ASC, id ASC",
        };

        let events = sqlx::query_as::<_, TelemetryEvent>(sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    async fn find_by_sensor_id(&self, sensor_id: &str) -> RepositoryResult<Vec<TelemetryEvent>> {
        let events = sqlx::query_as::<_, TelemetryEvent>(
            "SELECT * FROM telemetry_events WHERE sensor_id = $1 ORDER BY id",
        )
        .bind(sensor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn delete_all(&self) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM telemetry_events")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
