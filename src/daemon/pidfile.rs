//! Durable PID records for daemon processes.
//!
//! The file's existence plus an OS liveness check is the sole source of truth
//! for "is this daemon running" — there is no separate status field to drift
//! out of sync with reality.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a PID record. `None` records the current process.
    pub fn write(&self, pid: Option<u32>) -> std::io::Result<()> {
        let pid = pid.unwrap_or_else(std::process::id);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{pid}\n"))?;
        trace!(pid = pid, path = %self.path.display(), "PID file written");
        Ok(())
    }

    /// Read the recorded PID. A missing or corrupt file is `None`, never an
    /// error, so callers can treat both uniformly as "not running".
    pub fn read(&self) -> Option<u32> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match content.trim().parse::<u32>() {
            Ok(pid) => Some(pid),
            Err(_) => {
                warn!(path = %self.path.display(), "PID file is corrupt, ignoring");
                None
            }
        }
    }

    /// Delete the record file. Returns whether a file was removed.
    pub fn remove(&self) -> bool {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                trace!(path = %self.path.display(), "PID file removed");
                true
            }
            Err(_) => false,
        }
    }

    /// Whether the recorded process is currently alive.
    pub fn is_running(&self) -> bool {
        self.read().is_some_and(process_alive)
    }

    /// Terminate a live recorded process: graceful signal first, bounded wait,
    /// then forced kill. The record file is removed in all cases. Returns
    /// whether a live process had to be terminated.
    pub fn kill_existing(&self, timeout: Duration) -> bool {
        let Some(pid) = self.read() else {
            return false;
        };
        if !process_alive(pid) {
            debug!(pid = pid, "Recorded process already gone, removing stale record");
            self.remove();
            return false;
        }

        info!(pid = pid, "Terminating existing process");
        terminate_graceful(pid);

        let deadline = Instant::now() + timeout;
        while process_alive(pid) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }

        if process_alive(pid) {
            warn!(pid = pid, timeout = ?timeout, "Graceful termination timed out, forcing kill");
            terminate_forced(pid);
        }

        self.remove();
        true
    }

    /// Remove the record when the process it names no longer exists. Never
    /// kills anything. Returns whether a stale record was cleaned up.
    pub fn cleanup_stale(&self) -> bool {
        match self.read() {
            Some(pid) if !process_alive(pid) => {
                debug!(pid = pid, path = %self.path.display(), "Cleaning up stale PID file");
                self.remove()
            }
            Some(_) => false,
            None => {
                // A corrupt file still parses to None but may exist on disk
                if self.path.exists() {
                    self.remove()
                } else {
                    false
                }
            }
        }
    }
}

/// RAII record for a daemon's own PID: written on construction, removed on
/// drop so every exit path (including panic unwind) clears the record.
pub struct PidGuard {
    file: PidFile,
}

impl PidGuard {
    pub fn acquire(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let file = PidFile::new(path);
        file.write(None)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        self.file.remove();
    }
}

/// Existence check without signal delivery.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    // kill(pid, 0) performs permission and existence checks only. EPERM means
    // the process exists but belongs to another user.
    let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };
    ret == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(pid: u32) -> bool {
    use std::process::Command;
    let output = Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH", "/FO", "CSV"])
        .output();
    match output {
        Ok(out) => String::from_utf8_lossy(&out.stdout).contains(&format!("\"{pid}\"")),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn terminate_graceful(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(unix)]
fn terminate_forced(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn terminate_graceful(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .output();
}

#[cfg(not(unix))]
fn terminate_forced(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .output();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid_file(tmp: &tempfile::TempDir) -> PidFile {
        PidFile::new(tmp.path().join("test.pid"))
    }

    // Positive in i32 and far above any configurable pid_max
    const DEAD_PID: u32 = 500_000_000;

    #[test]
    fn test_write_read_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);
        file.write(Some(42_424)).unwrap();
        assert_eq!(file.read(), Some(42_424));
    }

    #[test]
    fn test_missing_file_reads_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(pid_file(&tmp).read(), None);
    }

    #[test]
    fn test_corrupt_file_reads_none() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);
        std::fs::write(file.path(), "not-a-pid\n").unwrap();
        assert_eq!(file.read(), None);
    }

    #[test]
    fn test_write_defaults_to_own_pid() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);
        file.write(None).unwrap();
        assert_eq!(file.read(), Some(std::process::id()));
        assert!(file.is_running());
    }

    #[test]
    fn test_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);
        assert!(!file.remove());
        file.write(Some(1234)).unwrap();
        assert!(file.remove());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_cleanup_stale_removes_dead_record() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);
        file.write(Some(DEAD_PID)).unwrap();
        assert!(file.cleanup_stale());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_cleanup_stale_keeps_live_record() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);
        file.write(None).unwrap();
        assert!(!file.cleanup_stale());
        assert!(file.path().exists());
    }

    #[test]
    fn test_cleanup_stale_removes_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);
        std::fs::write(file.path(), "garbage").unwrap();
        assert!(file.cleanup_stale());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_kill_existing_on_dead_record_just_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);
        file.write(Some(DEAD_PID)).unwrap();
        assert!(!file.kill_existing(Duration::from_secs(1)));
        assert!(!file.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_existing_terminates_and_removes_record() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);

        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        file.write(Some(child.id())).unwrap();
        // Reap the child as soon as it dies so the liveness check sees it exit
        let reaper = std::thread::spawn(move || {
            let _ = child.wait();
        });

        assert!(file.kill_existing(Duration::from_secs(5)));
        assert!(!file.path().exists());
        reaper.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_existing_escalates_when_term_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let file = pid_file(&tmp);

        let mut child = std::process::Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .spawn()
            .unwrap();
        file.write(Some(child.id())).unwrap();
        let reaper = std::thread::spawn(move || {
            let _ = child.wait();
        });

        // TERM is ignored; the bounded wait must elapse and KILL must land
        assert!(file.kill_existing(Duration::from_millis(500)));
        assert!(!file.path().exists());
        reaper.join().unwrap();
    }

    #[test]
    fn test_pid_guard_removes_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("guard.pid");
        {
            let guard = PidGuard::acquire(&path).unwrap();
            assert!(guard.path().exists());
        }
        assert!(!path.exists());
    }
}
