//! In-memory bookkeeping of daemons known to this host process.
//!
//! Purely additive diagnostics: lifecycle start/stop correctness never depends
//! on the registry, and callers that run a single daemon can ignore it.

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    Running,
    Error,
}

#[derive(Debug, Clone)]
pub struct DaemonEntry {
    pub name: String,
    pub pid: u32,
    pub working_dir: PathBuf,
    pub started_at: Instant,
    pub status: DaemonStatus,
    pub last_health: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSummary {
    pub total: usize,
    pub running: usize,
    pub errored: usize,
    pub unhealthy: Vec<String>,
}

impl HealthSummary {
    pub fn all_healthy(&self) -> bool {
        self.errored == 0
    }
}

#[derive(Default)]
pub struct DaemonRegistry {
    entries: RwLock<HashMap<String, DaemonEntry>>,
}

impl DaemonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: impl Into<String>, pid: u32, working_dir: PathBuf) {
        let name = name.into();
        debug!(daemon = %name, pid = pid, "Registering daemon");
        let entry = DaemonEntry {
            name: name.clone(),
            pid,
            working_dir,
            started_at: Instant::now(),
            status: DaemonStatus::Running,
            last_health: None,
        };
        self.entries.write().await.insert(name, entry);
    }

    /// Record a health payload and mark the daemon running again.
    pub async fn report_health(&self, name: &str, health: Value) {
        if let Some(entry) = self.entries.write().await.get_mut(name) {
            trace!(daemon = name, "Health reported");
            entry.status = DaemonStatus::Running;
            entry.last_health = Some(health);
        }
    }

    pub async fn mark_error(&self, name: &str) {
        if let Some(entry) = self.entries.write().await.get_mut(name) {
            debug!(daemon = name, "Marking daemon errored");
            entry.status = DaemonStatus::Error;
        }
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.entries.write().await.remove(name).is_some();
        if removed {
            debug!(daemon = name, "Unregistered daemon");
        }
        removed
    }

    pub async fn get(&self, name: &str) -> Option<DaemonEntry> {
        self.entries.read().await.get(name).cloned()
    }

    pub async fn snapshot(&self) -> Vec<DaemonEntry> {
        let mut entries: Vec<DaemonEntry> =
            self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub async fn summary(&self) -> HealthSummary {
        let entries = self.entries.read().await;
        let mut summary = HealthSummary {
            total: entries.len(),
            running: 0,
            errored: 0,
            unhealthy: Vec::new(),
        };
        for entry in entries.values() {
            match entry.status {
                DaemonStatus::Running => summary.running += 1,
                DaemonStatus::Error => {
                    summary.errored += 1;
                    summary.unhealthy.push(entry.name.clone());
                }
            }
        }
        summary.unhealthy.sort();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_snapshot() {
        let registry = DaemonRegistry::new();
        registry.register("indexer", 100, PathBuf::from("/tmp")).await;
        registry.register("notes", 200, PathBuf::from("/tmp")).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].name, "indexer");
        assert_eq!(snapshot[1].pid, 200);
        assert_eq!(snapshot[0].status, DaemonStatus::Running);
    }

    #[tokio::test]
    async fn test_health_cycle() {
        let registry = DaemonRegistry::new();
        registry.register("indexer", 100, PathBuf::from("/tmp")).await;

        registry.mark_error("indexer").await;
        assert_eq!(
            registry.get("indexer").await.unwrap().status,
            DaemonStatus::Error
        );

        registry
            .report_health("indexer", json!({"uptime_secs": 5}))
            .await;
        let entry = registry.get("indexer").await.unwrap();
        assert_eq!(entry.status, DaemonStatus::Running);
        assert_eq!(entry.last_health, Some(json!({"uptime_secs": 5})));
    }

    #[tokio::test]
    async fn test_summary_counts_unhealthy() {
        let registry = DaemonRegistry::new();
        registry.register("a", 1, PathBuf::from("/")).await;
        registry.register("b", 2, PathBuf::from("/")).await;
        registry.register("c", 3, PathBuf::from("/")).await;
        registry.mark_error("b").await;

        let summary = registry.summary().await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.running, 2);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.unhealthy, vec!["b".to_string()]);
        assert!(!summary.all_healthy());
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = DaemonRegistry::new();
        registry.register("a", 1, PathBuf::from("/")).await;
        assert!(registry.unregister("a").await);
        assert!(!registry.unregister("a").await);
        assert!(registry.snapshot().await.is_empty());
    }
}
