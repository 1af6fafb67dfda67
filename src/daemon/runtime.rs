//! The daemon process body: one tokio runtime multiplexing the IPC accept
//! loop, the periodic tasks, and the watcher's debounce timer.
//!
//! The PID record is held by a guard so every exit path, including unwind,
//! removes it.

use super::pidfile::{PidFile, PidGuard};
use super::scheduler::PeriodicTask;
use super::server::{IpcHandler, IpcServer};
use super::shutdown::ShutdownCoordinator;
use super::watcher::FileWatcher;
use crate::clienv;
use crate::error::{HostError, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct DaemonRuntime {
    name: String,
    pid_path: PathBuf,
    port_path: PathBuf,
    handler: IpcHandler,
    tasks: Vec<PeriodicTask>,
    watcher: Option<FileWatcher>,
}

impl DaemonRuntime {
    pub fn new(name: impl Into<String>, handler: IpcHandler) -> Self {
        let name = name.into();
        Self {
            pid_path: clienv::daemon_pid_path(&name),
            port_path: clienv::daemon_port_path(&name),
            name,
            handler,
            tasks: Vec::new(),
            watcher: None,
        }
    }

    pub fn with_pid_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pid_path = path.into();
        self
    }

    pub fn with_port_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.port_path = path.into();
        self
    }

    pub fn add_task(&mut self, task: PeriodicTask) {
        self.tasks.push(task);
    }

    pub fn set_watcher(&mut self, watcher: FileWatcher) {
        self.watcher = Some(watcher);
    }

    /// Run until a shutdown signal arrives (IPC `shutdown`, SIGTERM, or
    /// SIGINT), then tear down tasks and the watcher with a bounded grace
    /// period.
    pub async fn run(mut self) -> Result<()> {
        info!(daemon = %self.name, "Daemon starting");

        let existing = PidFile::new(&self.pid_path);
        if let Some(pid) = existing.read().filter(|_| existing.is_running()) {
            return Err(HostError::Config(format!(
                "daemon '{}' already running with PID {pid}",
                self.name
            )));
        }
        existing.cleanup_stale();
        let _pid_guard = PidGuard::acquire(&self.pid_path)?;
        info!(path = %self.pid_path.display(), "PID file written");

        let shutdown = ShutdownCoordinator::new();
        install_signal_handlers(&shutdown)?;

        for i in 0..self.tasks.len() {
            if let Err(e) = self.tasks[i].start() {
                self.teardown().await;
                return Err(e);
            }
        }
        let watcher_ok = match &mut self.watcher {
            Some(watcher) => match watcher.start() {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Watcher failed to start, continuing without it");
                    false
                }
            },
            None => true,
        };
        if !watcher_ok {
            self.watcher = None;
        }

        let bound = match IpcServer::new(&self.port_path, self.handler.clone())
            .bind()
            .await
        {
            Ok(bound) => bound,
            Err(e) => {
                // The tasks above are already spinning; stop them before
                // handing the error back
                self.teardown().await;
                return Err(e);
            }
        };
        info!(daemon = %self.name, port = bound.port(), "Daemon ready");
        let served = bound.serve(shutdown.handle()).await;

        info!(daemon = %self.name, "Shutting down");
        self.teardown().await;
        served?;
        info!(daemon = %self.name, "Daemon stopped");
        Ok(())
    }

    async fn teardown(&mut self) {
        for task in &mut self.tasks {
            task.stop(TEARDOWN_GRACE).await;
        }
        if let Some(watcher) = &mut self.watcher {
            watcher.stop(TEARDOWN_GRACE).await;
        }
    }
}

#[cfg(unix)]
fn install_signal_handlers(shutdown: &ShutdownCoordinator) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let handle = shutdown.handle();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        handle.shutdown();
    });
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handlers(shutdown: &ShutdownCoordinator) -> Result<()> {
    let handle = shutdown.handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C");
        handle.shutdown();
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::client::IpcClient;
    use crate::daemon::protocol::IpcRequest;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn echo_handler() -> IpcHandler {
        Arc::new(|req: IpcRequest| Ok(json!({ "method": req.method })))
    }

    #[tokio::test]
    async fn test_full_daemon_lifecycle_over_ipc() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_path = tmp.path().join("svc.pid");
        let port_path = tmp.path().join("svc.port");

        let runtime = DaemonRuntime::new("svc", echo_handler())
            .with_pid_path(&pid_path)
            .with_port_path(&port_path);
        let run = tokio::spawn(runtime.run());

        // Wait for the port file to appear
        let mut client = IpcClient::new(&port_path);
        for _ in 0..100 {
            if client.is_available() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(client.is_available(), "daemon never published its port");
        assert!(pid_path.exists());

        let result = client.call(IpcRequest::new("sync", json!({}))).await.unwrap();
        assert_eq!(result, json!({ "method": "sync" }));

        let reply = client.ping().await.unwrap();
        assert_eq!(reply.version, env!("CARGO_PKG_VERSION"));

        client.call(IpcRequest::shutdown()).await.unwrap();
        client.close();
        tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("daemon did not stop")
            .unwrap()
            .unwrap();

        assert!(!pid_path.exists(), "PID file survived shutdown");
        assert!(!port_path.exists(), "port file survived shutdown");
    }

    #[tokio::test]
    async fn test_bind_failure_stops_started_tasks() {
        let tmp = tempfile::tempdir().unwrap();
        // A plain file where the port file's parent directory should be, so
        // binding fails after the periodic tasks have started
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let pid_path = tmp.path().join("svc.pid");

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut runtime = DaemonRuntime::new("svc", echo_handler())
            .with_pid_path(&pid_path)
            .with_port_path(blocker.join("svc.port"));
        runtime.add_task(PeriodicTask::new(
            "tick",
            Duration::from_millis(20),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ));

        assert!(runtime.run().await.is_err());
        assert!(!pid_path.exists(), "PID file survived the failed start");

        let after = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            ticks.load(Ordering::SeqCst),
            after,
            "periodic task survived the failed start"
        );
    }

    #[tokio::test]
    async fn test_second_instance_refused_while_first_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_path = tmp.path().join("svc.pid");
        // Record this very process as the running instance
        PidFile::new(&pid_path).write(None).unwrap();

        let runtime = DaemonRuntime::new("svc", echo_handler())
            .with_pid_path(&pid_path)
            .with_port_path(tmp.path().join("svc.port"));
        let err = runtime.run().await.unwrap_err();
        assert!(matches!(err, HostError::Config(_)));
        // The prior record must be untouched
        assert!(pid_path.exists());
    }
}
