//! Debounced filesystem watching for the daemon loop.
//!
//! Raw change notifications are filtered by glob pattern, accumulated into a
//! pending set, and delivered as one batch once the debounce window elapses
//! with no further events. An editor writing several files in one save thus
//! produces a single `on_change` call.

use crate::config::WatchMode;
use crate::error::Result;
use glob_match::glob_match;
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub type ChangeCallback = Arc<dyn Fn(&[PathBuf]) -> anyhow::Result<()> + Send + Sync + 'static>;

pub struct FileWatcher {
    root: PathBuf,
    patterns: Vec<String>,
    debounce: Duration,
    mode: WatchMode,
    on_change: ChangeCallback,
    running: Option<WatchTask>,
}

struct WatchTask {
    // Dropping the backend unsubscribes from OS notifications.
    _backend: Box<dyn Watcher + Send>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl FileWatcher {
    pub fn new(
        root: impl Into<PathBuf>,
        patterns: Vec<String>,
        debounce: Duration,
        mode: WatchMode,
        on_change: ChangeCallback,
    ) -> Self {
        Self {
            root: root.into(),
            patterns,
            debounce,
            mode,
            on_change,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Subscribe to changes under the root and spawn the debounce loop.
    pub fn start(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();

        let root = self.root.clone();
        let patterns = self.patterns.clone();
        let event_handler = move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                let matched: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|path| path_matches(&root, &patterns, path))
                    .collect();
                if !matched.is_empty() {
                    let _ = tx.send(matched);
                }
            }
            Err(e) => warn!(error = %e, "Watch backend error"),
        };

        let mut backend: Box<dyn Watcher + Send> = match self.mode {
            WatchMode::Event => Box::new(RecommendedWatcher::new(
                event_handler,
                Config::default(),
            )?),
            WatchMode::Poll => Box::new(PollWatcher::new(
                event_handler,
                Config::default().with_poll_interval(Duration::from_secs(2)),
            )?),
        };
        backend.watch(&self.root, RecursiveMode::Recursive)?;
        info!(root = %self.root.display(), mode = ?self.mode, "Watching for changes");

        let token = CancellationToken::new();
        let handle = spawn_debounce_loop(rx, self.debounce, Arc::clone(&self.on_change), token.clone());

        self.running = Some(WatchTask {
            _backend: backend,
            token,
            handle,
        });
        Ok(())
    }

    /// Signal cancellation and wait up to `timeout` for the debounce loop to
    /// exit; force-abort if a stuck callback holds it past that.
    pub async fn stop(&mut self, timeout: Duration) {
        let Some(mut task) = self.running.take() else {
            return;
        };
        task.token.cancel();

        match tokio::time::timeout(timeout, &mut task.handle).await {
            Ok(_) => info!(root = %self.root.display(), "Watcher stopped"),
            Err(_) => {
                warn!(root = %self.root.display(), timeout = ?timeout, "Debounce loop did not stop in time, aborting");
                task.handle.abort();
            }
        }
    }
}

/// Accumulate matched paths and deliver them as one batch after a quiet
/// period. Every new event resets the window.
fn spawn_debounce_loop(
    mut rx: mpsc::UnboundedReceiver<Vec<PathBuf>>,
    debounce: Duration,
    on_change: ChangeCallback,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
        let mut deadline: Option<tokio::time::Instant> = None;

        loop {
            let timer = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                batch = rx.recv() => match batch {
                    Some(paths) => {
                        for path in paths {
                            trace!(path = %path.display(), "Change pending");
                            pending.insert(path);
                        }
                        deadline = Some(tokio::time::Instant::now() + debounce);
                    }
                    None => break,
                },
                _ = timer => {
                    let batch: Vec<PathBuf> = std::mem::take(&mut pending).into_iter().collect();
                    deadline = None;
                    debug!(count = batch.len(), "Delivering debounced change batch");
                    if let Err(e) = on_change(&batch) {
                        warn!(error = %e, "Change callback failed");
                    }
                }
                _ = token.cancelled() => break,
            }
        }
    })
}

/// A pattern containing no separator is matched against the file name alone,
/// so `"*.toml"` works without spelling out `"**/*.toml"`.
fn path_matches(root: &Path, patterns: &[String], path: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel_str = rel.to_string_lossy();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    patterns.iter().any(|pattern| {
        glob_match(pattern, &rel_str) || (!pattern.contains('/') && glob_match(pattern, &name))
    })
}
