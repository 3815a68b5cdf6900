use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::signal::ShutdownSignal;
use crate::models::NewTelemetryEvent;

/// Work performed on an event before it is persisted.
///
/// Implementations should check `signal` during long-running work and return early
/// when it is raised. An `Err` skips persistence and dead-letters the event.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, event: &NewTelemetryEvent, signal: &mut ShutdownSignal) -> Result<()>;
}

/// Stand-in for post-mortem analysis: waits a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedAnalysis {
    delay: Duration,
}

impl SimulatedAnalysis {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(1500);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedAnalysis {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl Analyzer for SimulatedAnalysis {
    async fn analyze(&self, event: &NewTelemetryEvent, signal: &mut ShutdownSignal) -> Result<()> {
        debug!("Simulating {:?} of analysis for {}", self.delay, event.sensor_label());

        // Interruption is not an analysis failure; the event still gets archived.
        if signal.pause(self.delay).await.is_err() {
            warn!(
                "Analysis of {} from {} interrupted by shutdown",
                event.event_type_label(),
                event.sensor_label()
            );
        }

        Ok(())
    }
}
