use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("interrupted by shutdown")]
pub struct Interrupted;

/// Cooperative interruption shared by the pool and every running task.
///
/// Once raised the flag stays raised: every later `pause` returns `Err(Interrupted)`
/// immediately. Dropping the owning `ShutdownTrigger` counts as raising it.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl ShutdownSignal {
    pub fn is_interrupted(&self) -> bool {
        let raised = *self.rx.borrow();
        raised || self.rx.has_changed().is_err()
    }

    /// Resolves once the flag is raised or the trigger is gone.
    pub async fn interrupted(&mut self) {
        loop {
            let raised = *self.rx.borrow_and_update();
            if raised {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleeps for `duration` unless interrupted first.
    pub async fn pause(&mut self, duration: Duration) -> Result<(), Interrupted> {
        if self.is_interrupted() {
            return Err(Interrupted);
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.interrupted() => Err(Interrupted),
        }
    }
}
