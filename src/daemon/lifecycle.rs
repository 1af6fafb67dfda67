//! Starting, stopping, and querying named daemon processes.
//!
//! One PID record exists per daemon name; `start` kills a live prior instance
//! first so restarts are idempotent and two processes never own the same
//! record. Platform differences in detached spawning live behind
//! [`spawn_detached`]; callers never branch on platform.

use super::pidfile::PidFile;
use crate::clienv;
use crate::config::HostConfig;
use crate::error::{HostError, Result};
use std::future::Future;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

/// Grace period given to a prior instance before the kill is forced.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DaemonLifecycleManager {
    config: HostConfig,
    data_dir: Option<PathBuf>,
}

impl DaemonLifecycleManager {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            data_dir: None,
        }
    }

    /// Override the state directory (used by tests to stay hermetic).
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    /// Same record paths the daemon runtime itself resolves, so manager and
    /// daemon always agree on where the records live.
    pub fn pid_path(&self, name: &str) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.join(format!("{name}.pid")),
            None => clienv::daemon_pid_path(name),
        }
    }

    pub fn port_path(&self, name: &str) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.join(format!("{name}.port")),
            None => clienv::daemon_port_path(name),
        }
    }

    /// Start a named daemon. Detached mode spawns `command`; foreground mode
    /// awaits `service` in this process (the mode used by tests and by
    /// `daemon run`). Returns the spawned PID in detached mode.
    pub async fn start<Fut>(
        &self,
        name: &str,
        service: impl FnOnce() -> Fut,
        command: Command,
        detach: bool,
    ) -> Result<Option<u32>>
    where
        Fut: Future<Output = Result<()>>,
    {
        self.prepare(name)?;
        if detach {
            let pid = self.spawn(name, command)?;
            Ok(Some(pid))
        } else {
            service().await?;
            Ok(None)
        }
    }

    /// Spawn a prepared daemon command detached from this process.
    pub fn start_detached(&self, name: &str, command: Command) -> Result<u32> {
        self.prepare(name)?;
        self.spawn(name, command)
    }

    /// Auto-start policy, prior-instance conflict resolution, stale cleanup.
    fn prepare(&self, name: &str) -> Result<()> {
        if !self.config.effective_auto_start() {
            return Err(HostError::AutoStartDisabled(name.to_string()));
        }

        let pid_file = PidFile::new(self.pid_path(name));
        if pid_file.is_running() {
            info!(daemon = name, "Prior instance is live, terminating it first");
            pid_file.kill_existing(STOP_TIMEOUT);
        } else if pid_file.cleanup_stale() {
            debug!(daemon = name, "Removed stale PID record");
        }
        Ok(())
    }

    fn spawn(&self, name: &str, mut command: Command) -> Result<u32> {
        let log_path = clienv::daemon_log_path(name);
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        command
            .stdin(std::process::Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log);

        let pid = spawn_detached(command).map_err(|e| HostError::SpawnFailed {
            name: name.to_string(),
            source: e,
        })?;
        info!(daemon = name, pid = pid, "Daemon spawned");
        Ok(pid)
    }

    /// Terminate a named daemon. Returns whether a live process was stopped.
    pub fn stop(&self, name: &str) -> bool {
        let stopped = PidFile::new(self.pid_path(name)).kill_existing(STOP_TIMEOUT);
        // A forced kill never reaches the server's own port-file cleanup
        let _ = std::fs::remove_file(self.port_path(name));
        if stopped {
            info!(daemon = name, "Daemon stopped");
        }
        stopped
    }

    pub fn is_running(&self, name: &str) -> bool {
        PidFile::new(self.pid_path(name)).is_running()
    }

    pub fn running_pid(&self, name: &str) -> Option<u32> {
        let pid_file = PidFile::new(self.pid_path(name));
        pid_file.read().filter(|_| pid_file.is_running())
    }
}

/// Spawn a command detached from the calling process: its own session on
/// POSIX, detached creation flags on Windows. Returns the child PID.
#[cfg(unix)]
pub fn spawn_detached(mut command: Command) -> std::io::Result<u32> {
    use std::os::unix::process::CommandExt;
    unsafe {
        command.pre_exec(|| {
            // New session: survives parent exit, detaches from the terminal
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
    let child = command.spawn()?;
    Ok(child.id())
}

#[cfg(not(unix))]
pub fn spawn_detached(mut command: Command) -> std::io::Result<u32> {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    command.creation_flags(CREATE_NO_WINDOW | DETACHED_PROCESS);
    let child = command.spawn()?;
    Ok(child.id())
}
