use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{validate, RepositoryResult, SortDirection, TelemetryRepository};
use crate::models::{NewTelemetryEvent, TelemetryEvent};

#[derive(Default)]
struct Inner {
    next_id: i64,
    events: Vec<TelemetryEvent>,
}

/// Process-local store. Rows live in insertion order; ids start at 1.
#[derive(Clone, Default)]
pub struct InMemoryTelemetryRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryTelemetryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TelemetryRepository for InMemoryTelemetryRepository {
    async fn save(&self, event: &NewTelemetryEvent) -> RepositoryResult<TelemetryEvent> {
        validate(event)?;

        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let saved = event.clone().with_id(inner.next_id);
        inner.events.push(saved.clone());

        Ok(saved)
    }

    async fn find_all(&self, direction: SortDirection) -> RepositoryResult<Vec<TelemetryEvent>> {
        let mut events = self.inner.read().await.events.clone();

        events.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));
        if direction == SortDirection::Descending {
            events.reverse();
        }

        Ok(events)
    }

    async fn find_by_sensor_id(&self, sensor_id: &str) -> RepositoryResult<Vec<TelemetryEvent>> {
        let events = self
            .inner
            .read()
            .await
            .events
            .iter()
            .filter(|e| e.sensor_id.as_deref() == Some(sensor_id))
            .cloned()
            .collect();

        Ok(events)
    }

    async fn delete_all(&self) -> RepositoryResult<()> {
        self.inner.write().await.events.clear();
        Ok(())
    }
}
