use std::path::PathBuf;

// Environment variable names consumed by the host and daemon layers.
pub const ENV_CONFIG_DIR: &str = "SKILLHOST_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "SKILLHOST_DATA_DIR";
pub const ENV_SKILLS_DIR: &str = "SKILLHOST_SKILLS_DIR";
pub const ENV_NO_DAEMON: &str = "SKILLHOST_NO_DAEMON";
pub const ENV_WATCH_MODE: &str = "SKILLHOST_WATCH_MODE";
pub const ENV_SYNC_INTERVAL: &str = "SKILLHOST_SYNC_INTERVAL";
pub const ENV_LOG: &str = "SKILLHOST_LOG";
pub const ENV_DAEMON_PID: &str = "SKILLHOST_DAEMON_PID";
pub const ENV_DAEMON_PORT_FILE: &str = "SKILLHOST_DAEMON_PORT_FILE";

const FALLBACK_CONFIG_DIR: &str = "~/.config";
const SKILLHOST_SUBDIR: &str = "skillhost";

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Config directory ($SKILLHOST_CONFIG_DIR or ~/.config/skillhost)
pub fn config_dir() -> PathBuf {
    let dir = env_opt(ENV_CONFIG_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from(FALLBACK_CONFIG_DIR))
                .join(SKILLHOST_SUBDIR)
        });
    tracing::trace!(dir = %dir.display(), "Resolved config directory");
    dir
}

/// Data directory ($SKILLHOST_DATA_DIR or ~/.local/share/skillhost)
pub fn data_dir() -> PathBuf {
    let dir = env_opt(ENV_DATA_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join(SKILLHOST_SUBDIR)
        });
    tracing::trace!(dir = %dir.display(), "Resolved data directory");
    dir
}

/// Skills directory ($SKILLHOST_SKILLS_DIR or <data_dir>/skills)
pub fn skills_dir() -> PathBuf {
    env_opt(ENV_SKILLS_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("skills"))
}

/// Whether daemon auto-start is disabled ($SKILLHOST_NO_DAEMON=1|true|yes|on)
pub fn daemon_disabled() -> bool {
    let disabled = env_opt(ENV_NO_DAEMON)
        .map(|v| is_truthy(&v))
        .unwrap_or(false);
    tracing::trace!(disabled = disabled, "Daemon auto-start disabled check");
    disabled
}

/// Watch mode override ($SKILLHOST_WATCH_MODE=event|poll)
pub fn watch_mode() -> Option<String> {
    let val = env_opt(ENV_WATCH_MODE);
    tracing::trace!(value = ?val, "SKILLHOST_WATCH_MODE env var");
    val
}

/// Sync interval override in seconds ($SKILLHOST_SYNC_INTERVAL)
pub fn sync_interval_secs() -> Option<u64> {
    env_opt(ENV_SYNC_INTERVAL).and_then(|s| s.parse().ok())
}

/// Log filter directive ($SKILLHOST_LOG, e.g. "skillhost=debug")
pub fn log_filter() -> Option<String> {
    env_opt(ENV_LOG)
}

/// Daemon PID file path for a named daemon
/// ($SKILLHOST_DAEMON_PID or <data_dir>/<name>.pid)
pub fn daemon_pid_path(name: &str) -> PathBuf {
    let path = env_opt(ENV_DAEMON_PID)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join(format!("{name}.pid")));
    tracing::trace!(path = %path.display(), "Daemon PID path");
    path
}

/// Port-discovery file path for a named daemon
/// ($SKILLHOST_DAEMON_PORT_FILE or <data_dir>/<name>.port)
pub fn daemon_port_path(name: &str) -> PathBuf {
    let path = env_opt(ENV_DAEMON_PORT_FILE)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join(format!("{name}.port")));
    tracing::trace!(path = %path.display(), "Daemon port-discovery path");
    path
}

/// Daemon log file path (<data_dir>/logs/<name>.log)
pub fn daemon_log_path(name: &str) -> PathBuf {
    data_dir().join("logs").join(format!("{name}.log"))
}
