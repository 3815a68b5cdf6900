use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::NewTelemetryEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Analysis,
    Persistence,
    Panic,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Analysis => "analysis",
            FailureStage::Persistence => "persistence",
            FailureStage::Panic => "panic",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterPayload {
    pub action: String,

    pub data: DeadLetterData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterData {
    pub stage: FailureStage,

    pub error: String,

    pub event: serde_json::Value,
}

/// Receives events whose background processing failed. Always logs; forwards to a
/// webhook when one is configured. Nothing is reported back to the ingesting client.
#[derive(Clone)]
pub struct DeadLetterSink {
    webhook: Option<(Client, String)>,
}

impl DeadLetterSink {
    pub fn new(webhook_url: Option<String>) -> Result<Self> {
        let webhook = match webhook_url {
            Some(url) => {
                let client = Client::builder()
                    .timeout(std::time::Duration::from_secs(10))
                    .build()?;
                Some((client, url))
            }
            None => None,
        };

        Ok(Self { webhook })
    }

    pub fn log_only() -> Self {
        Self { webhook: None }
    }

    pub fn payload(stage: FailureStage, err: &str, event: &NewTelemetryEvent) -> DeadLetterPayload {
        DeadLetterPayload {
            action: "telemetry.failed".to_string(),
            data: DeadLetterData {
                stage,
                error: err.to_string(),
                event: serde_json::to_value(event).unwrap_or_default(),
            },
        }
    }

    /// Logs the failure right away. Webhook delivery runs on its own task so a slow
    /// endpoint never holds up the caller; the handle is returned for callers that care.
    pub fn record(
        &self,
        stage: FailureStage,
        err: &str,
        event: &NewTelemetryEvent,
    ) -> Option<JoinHandle<()>> {
        error!(
            "Dropping event from {} ({}) after {} failure: {}",
            event.sensor_label(),
            event.event_type_label(),
            stage,
            err
        );

        let (client, url) = self.webhook.clone()?;
        let payload = Self::payload(stage, err, event);
        let sensor = event.sensor_label().to_string();

        Some(tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("Dead letter for {} delivered to {}", sensor, url);
                }
                Ok(response) => {
                    warn!(
                        "Dead letter webhook failed with status {}: {}",
                        response.status(),
                        url
                    );
                }
                Err(e) => {
                    error!("Failed to send dead letter to {}: {}", url, e);
                }
            }
        }))
    }
}

impl Default for DeadLetterSink {
    fn default() -> Self {
        Self::log_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use std::time::{Duration, Instant};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn event(sensor_id: Option<&str>, value: Option<f64>) -> NewTelemetryEvent {
        NewTelemetryEvent {
            sensor_id: sensor_id.map(str::to_string),
            event_type: Some("BEAM_LOSS".to_string()),
            fill_number: Some(9120),
            accelerator: Some("LHC".to_string()),
            timestamp: Utc::now(),
            value,
        }
    }

    async fn spawn_webhook(
        status: StatusCode,
    ) -> (String, mpsc::UnboundedReceiver<DeadLetterPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/hook",
            post(move |Json(payload): Json<DeadLetterPayload>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(payload);
                    status
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/hook", addr), rx)
    }

    /// Accepts connections and never answers.
    async fn spawn_silent_webhook() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        format!("http://{}/hook", addr)
    }

    #[test]
    fn test_dead_letter_payload_serialization() {
        let payload = DeadLetterSink::payload(
            FailureStage::Persistence,
            "Beam intensity cannot be negative",
            &event(Some("BLM-7R3"), Some(-3.0)),
        );

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["action"], "telemetry.failed");
        assert_eq!(json["data"]["stage"], "persistence");
        assert_eq!(json["data"]["event"]["sensorId"], "BLM-7R3");
        assert_eq!(json["data"]["event"]["value"], -3.0);
    }

    #[tokio::test]
    async fn test_log_only_sink_spawns_nothing() {
        let handle =
            DeadLetterSink::log_only().record(FailureStage::Analysis, "boom", &event(None, None));
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn test_webhook_receives_dead_letter() {
        let (url, mut received) = spawn_webhook(StatusCode::OK).await;
        let sink = DeadLetterSink::new(Some(url)).unwrap();

        let handle = sink
            .record(
                FailureStage::Persistence,
                "Beam intensity cannot be negative",
                &event(Some("S1"), Some(-3.0)),
            )
            .unwrap();
        handle.await.unwrap();

        let payload = tokio::time::timeout(Duration::from_secs(5), received.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload.action, "telemetry.failed");
        assert_eq!(payload.data.stage, FailureStage::Persistence);
        assert_eq!(payload.data.error, "Beam intensity cannot be negative");
        assert_eq!(payload.data.event["sensorId"], "S1");
    }

    #[tokio::test]
    async fn test_webhook_error_status_is_tolerated() {
        let (url, mut received) = spawn_webhook(StatusCode::SERVICE_UNAVAILABLE).await;
        let sink = DeadLetterSink::new(Some(url)).unwrap();

        let handle = sink
            .record(FailureStage::Analysis, "detector offline", &event(None, None))
            .unwrap();
        handle.await.unwrap();

        let payload = received.recv().await.unwrap();
        assert_eq!(payload.data.stage, FailureStage::Analysis);
        assert!(payload.data.event["sensorId"].is_null());
    }

    #[tokio::test]
    async fn test_silent_webhook_does_not_hold_caller() {
        let sink = DeadLetterSink::new(Some(spawn_silent_webhook().await)).unwrap();

        let started = Instant::now();
        let handle = sink.record(FailureStage::Persistence, "rejected", &event(Some("S1"), None));
        assert!(started.elapsed() < Duration::from_millis(200));

        let handle = handle.unwrap();
        assert!(!handle.is_finished());
        handle.abort();
    }
}
