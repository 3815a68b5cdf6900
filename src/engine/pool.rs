//! Fixed-size pool of ingestion workers.
//!
//! Workers share one unbounded queue, so `submit` never waits and never fails for
//! lack of capacity. A sustained ingest rate above what the workers can drain grows
//! the queue without limit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::analysis::Analyzer;
use super::signal::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
use crate::models::NewTelemetryEvent;
use crate::repositories::TelemetryRepository;
use crate::services::{DeadLetterSink, FailureStage};

pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool is shutting down")]
    ShuttingDown,

    #[error("worker pool queue is closed")]
    Closed,
}

struct WorkerContext {
    analyzer: Arc<dyn Analyzer>,
    repository: Arc<dyn TelemetryRepository>,
    dead_letter: DeadLetterSink,
    pending: AtomicUsize,
}

pub struct WorkerPool {
    /// `None` once shutdown has begun. Held for reading across the whole send.
    sender: RwLock<Option<mpsc::UnboundedSender<NewTelemetryEvent>>>,
    trigger: ShutdownTrigger,
    context: Arc<WorkerContext>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    workers: usize,
}

impl WorkerPool {
    /// Spawns `workers` long-lived workers on the current tokio runtime.
    pub fn start(
        workers: usize,
        analyzer: Arc<dyn Analyzer>,
        repository: Arc<dyn TelemetryRepository>,
        dead_letter: DeadLetterSink,
    ) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let (trigger, signal) = shutdown_channel();

        let context = Arc::new(WorkerContext {
            analyzer,
            repository,
            dead_letter,
            pending: AtomicUsize::new(0),
        });

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    receiver.clone(),
                    context.clone(),
                    signal.clone(),
                ))
            })
            .collect();

        info!("Started ingestion pool with {} worker(s)", workers);

        Self {
            sender: RwLock::new(Some(sender)),
            trigger,
            context,
            handles: Mutex::new(handles),
            workers,
        }
    }

    /// Queues an event for analysis and persistence. Returns without waiting for either.
    pub fn submit(&self, event: NewTelemetryEvent) -> Result<(), PoolError> {
        let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = guard.as_ref() else {
            return Err(PoolError::ShuttingDown);
        };

        self.context.pending.fetch_add(1, Ordering::SeqCst);
        if sender.send(event).is_err() {
            self.context.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::Closed);
        }

        Ok(())
    }

    /// Events queued or in flight.
    pub fn pending(&self) -> usize {
        self.context.pending.load(Ordering::SeqCst)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_accepting(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Stops accepting submissions, interrupts running analysis and waits up to
    /// `timeout` for the workers to drain the queue and exit.
    pub async fn shutdown(&self, timeout: Duration) {
        // Every accepted event is queued before workers can observe the trigger.
        drop(
            self.sender
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );
        self.trigger.trigger();

        let handles = std::mem::take(&mut *self.handles.lock().await);
        if handles.is_empty() {
            return;
        }

        info!(
            "Draining ingestion pool ({} event(s) pending)",
            self.pending()
        );

        let drain = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!("Ingestion worker ended abnormally: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(()) => info!("Ingestion pool stopped"),
            Err(_) => warn!(
                "Ingestion pool did not drain within {:?}; {} event(s) abandoned",
                timeout,
                self.pending()
            ),
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<NewTelemetryEvent>>>,
    context: Arc<WorkerContext>,
    mut signal: ShutdownSignal,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let next = {
            let mut rx = receiver.lock().await;
            if signal.is_interrupted() {
                rx.try_recv().ok()
            } else {
                let received = tokio::select! {
                    event = rx.recv() => Some(event),
                    _ = signal.interrupted() => None,
                };
                match received {
                    Some(event) => event,
                    None => rx.try_recv().ok(),
                }
            }
        };

        let Some(event) = next else {
            break;
        };

        run_task(&context, event, signal.clone()).await;
        context.pending.fetch_sub(1, Ordering::SeqCst);
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs one event on its own task so a panic is contained to that event.
async fn run_task(context: &Arc<WorkerContext>, event: NewTelemetryEvent, signal: ShutdownSignal) {
    let task_context = context.clone();
    let task_event = event.clone();

    let handle = tokio::spawn(async move { process(&task_context, task_event, signal).await });

    if let Err(e) = handle.await {
        context
            .dead_letter
            .record(FailureStage::Panic, &e.to_string(), &event);
    }
}

async fn process(context: &WorkerContext, event: NewTelemetryEvent, mut signal: ShutdownSignal) {
    info!(
        "[POST-MORTEM] Analyzing {} from Sensor: {}",
        event.event_type_label(),
        event.sensor_label()
    );

    if let Err(e) = context.analyzer.analyze(&event, &mut signal).await {
        context
            .dead_letter
            .record(FailureStage::Analysis, &e.to_string(), &event);
        return;
    }

    match context.repository.save(&event).await {
        Ok(saved) => {
            debug!("Stored event {} for {}", saved.id, event.sensor_label());
            info!(
                "[ARCHIVE] Event from {} successfully persisted to DB.",
                event.sensor_label()
            );
        }
        Err(e) => {
            context
                .dead_letter
                .record(FailureStage::Persistence, &e.to_string(), &event);
        }
    }
}
