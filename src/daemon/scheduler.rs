//! Fixed-interval background tasks for the daemon loop.
//!
//! Each task runs its callback, logs (never propagates) a failure, then waits
//! for the interval or the stop signal, whichever comes first.

use crate::error::{HostError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type TaskCallback = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync + 'static>;

pub struct PeriodicTask {
    name: String,
    interval: Duration,
    callback: TaskCallback,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl PeriodicTask {
    pub fn new(name: impl Into<String>, interval: Duration, callback: TaskCallback) -> Self {
        Self {
            name: name.into(),
            interval,
            callback,
            running: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Spawn the task loop. Starting an already-running task is an error, not
    /// a silent double-schedule.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(HostError::TaskAlreadyRunning(self.name.clone()));
        }

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let name = self.name.clone();
        let interval = self.interval;
        let callback = Arc::clone(&self.callback);

        info!(task = %name, interval = ?interval, "Starting periodic task");
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = callback() {
                    warn!(task = %name, error = %e, "Periodic task run failed");
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = loop_token.cancelled() => {
                        debug!(task = %name, "Periodic task observed stop signal");
                        break;
                    }
                }
            }
        });

        self.running = Some((token, handle));
        Ok(())
    }

    /// Signal cancellation and wait up to `timeout` for the loop to exit;
    /// force-abort if it does not.
    pub async fn stop(&mut self, timeout: Duration) {
        let Some((token, mut handle)) = self.running.take() else {
            return;
        };
        token.cancel();

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(_) => info!(task = %self.name, "Periodic task stopped"),
            Err(_) => {
                warn!(task = %self.name, timeout = ?timeout, "Periodic task did not stop in time, aborting");
                handle.abort();
            }
        }
    }
}
