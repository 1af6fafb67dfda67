use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    // --- Resolution errors (fatal to the loading stage of one skill) ---
    #[error("skill '{skill}' depends on '{dependency}', which is not installed")]
    MissingDependency { skill: String, dependency: String },

    #[error(
        "skill '{skill}' requires '{dependency}' {required}, but {found} is installed"
    )]
    VersionConstraint {
        skill: String,
        dependency: String,
        required: String,
        found: String,
    },

    #[error("circular dependency detected: {path}")]
    CycleDetected { path: String },

    #[error("invalid version string '{version}': {reason}")]
    VersionParse { version: String, reason: String },

    #[error("invalid manifest at {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("unknown skill: {0}")]
    UnknownSkill(String),

    // --- Process errors ---
    #[error("failed to spawn daemon '{name}': {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("daemon '{0}' auto-start is disabled")]
    AutoStartDisabled(String),

    // --- IPC errors ---
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    // --- Scheduler errors ---
    #[error("periodic task '{0}' is already running")]
    TaskAlreadyRunning(String),

    // --- Watcher errors ---
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Client-visible IPC failures, discriminated so callers can react
/// ("not running" is recoverable by starting the daemon; "timeout" may be
/// retried; "daemon" means the handler itself reported an error).
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("daemon not running (no port file at {0})")]
    NotRunning(PathBuf),

    #[error("daemon unresponsive (request timed out after {0:?})")]
    Timeout(std::time::Duration),

    #[error("daemon error: {0}")]
    Daemon(String),

    #[error("malformed IPC payload: {0}")]
    Malformed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("client is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, HostError>;
