use crate::args::DaemonCommands;
use anyhow::Result;
use serde_json::json;
use skillhost::clienv;
use skillhost::daemon::{
    DaemonLifecycleManager, DaemonRuntime, FileWatcher, IpcClient, IpcHandler, IpcRequest,
    PeriodicTask,
};
use skillhost::manifest::{self, MANIFEST_FILE};
use skillhost::{DependencyResolver, HostConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub async fn cmd_daemon(command: DaemonCommands) -> Result<()> {
    match command {
        DaemonCommands::Run { name } => cmd_daemon_run(&name).await,
        DaemonCommands::Start { name } => cmd_daemon_start(&name).await,
        DaemonCommands::Stop { name, force } => cmd_daemon_stop(&name, force).await,
        DaemonCommands::Restart { name } => cmd_daemon_restart(&name).await,
        DaemonCommands::Status { name } => cmd_daemon_status(&name).await,
    }
}

/// IPC surface of the host daemon: skill inspection over the wire.
fn host_handler() -> IpcHandler {
    Arc::new(|req: IpcRequest| {
        let skills_dir = clienv::skills_dir();
        match req.method.as_str() {
            "skills" => {
                let manifests =
                    manifest::discover_manifests(&skills_dir).map_err(|e| e.to_string())?;
                let skills: Vec<_> = manifests
                    .iter()
                    .map(|m| json!({ "name": m.name, "version": m.version, "entry": m.entry }))
                    .collect();
                Ok(json!({ "skills": skills }))
            }
            "order" => {
                let manifests =
                    manifest::discover_manifests(&skills_dir).map_err(|e| e.to_string())?;
                let mut order =
                    DependencyResolver::resolve(&manifests).map_err(|e| e.to_string())?;
                order.reverse();
                Ok(json!({ "order": order }))
            }
            other => Err(format!("unknown method: {other}")),
        }
    })
}

async fn cmd_daemon_run(name: &str) -> Result<()> {
    println!("Running daemon '{name}' in foreground (Ctrl+C to stop)");
    println!("  Skills: {}", clienv::skills_dir().display());
    println!("  PID:    {}", clienv::daemon_pid_path(name).display());
    println!("  Port:   {}", clienv::daemon_port_path(name).display());
    println!();

    let config = HostConfig::load_or_create()?;
    let skills_dir = clienv::skills_dir();

    let mut runtime = DaemonRuntime::new(name, host_handler());

    // Periodic re-scan of the skills directory
    let sync_dir = skills_dir.clone();
    runtime.add_task(PeriodicTask::new(
        "skill-sync",
        config.effective_sync_interval(),
        Arc::new(move || {
            let manifests = manifest::discover_manifests(&sync_dir)?;
            info!(count = manifests.len(), "Skill sync pass");
            Ok(())
        }),
    ));

    // React to manifest edits between sync passes
    runtime.set_watcher(FileWatcher::new(
        &skills_dir,
        vec![MANIFEST_FILE.to_string()],
        config.effective_debounce(),
        config.effective_watch_mode(),
        Arc::new(|paths: &[std::path::PathBuf]| {
            info!(count = paths.len(), "Skill manifests changed");
            for path in paths {
                info!(path = %path.display(), "Changed");
            }
            Ok(())
        }),
    ));

    runtime.run().await?;
    Ok(())
}

async fn cmd_daemon_start(name: &str) -> Result<()> {
    let config = HostConfig::load_or_create()?;
    let manager = DaemonLifecycleManager::new(config);
    let mut client = IpcClient::new(clienv::daemon_port_path(name));

    if manager.is_running(name) {
        if let Ok(reply) = client.ping().await {
            println!(
                "Daemon '{name}' already running (v{}, uptime: {})",
                reply.version,
                format_duration(reply.uptime_secs)
            );
            client.close();
            return Ok(());
        }
    }

    println!("Starting daemon '{name}'...");
    let mut command = std::process::Command::new(std::env::current_exe()?);
    command.args(["daemon", "run", "--name", name]);
    let pid = manager.start_detached(name, command)?;

    // Give it a moment to bind and publish its port
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(reply) = client.ping().await {
            println!("Daemon '{name}' started (v{}, PID {pid})", reply.version);
            client.close();
            return Ok(());
        }
    }
    client.close();
    warn!(daemon = name, pid = pid, "Daemon spawned but never answered a ping");
    anyhow::bail!("daemon '{name}' did not become ready (check {})", clienv::daemon_log_path(name).display())
}

async fn cmd_daemon_stop(name: &str, force: bool) -> Result<()> {
    let config = HostConfig::load_or_create()?;
    let manager = DaemonLifecycleManager::new(config);

    if !manager.is_running(name) {
        println!("Daemon '{name}' is not running");
        return Ok(());
    }

    if force {
        println!("Force stopping daemon '{name}'...");
        manager.stop(name);
        println!("Daemon '{name}' stopped");
        return Ok(());
    }

    println!("Stopping daemon '{name}' gracefully...");
    let mut client = IpcClient::new(clienv::daemon_port_path(name));
    let asked = client.call(IpcRequest::shutdown()).await.is_ok();
    client.close();

    if asked {
        for _ in 0..50 {
            if !manager.is_running(name) {
                println!("Daemon '{name}' stopped");
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    // Unresponsive or still alive after the grace period
    manager.stop(name);
    println!("Daemon '{name}' stopped");
    Ok(())
}

async fn cmd_daemon_restart(name: &str) -> Result<()> {
    println!("Restarting daemon '{name}'...");
    cmd_daemon_stop(name, false).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    cmd_daemon_start(name).await
}

async fn cmd_daemon_status(name: &str) -> Result<()> {
    let config = HostConfig::load_or_create()?;
    let manager = DaemonLifecycleManager::new(config);

    if !manager.is_running(name) {
        println!("Daemon '{name}': not running");
        println!("Run `skillhost daemon start` to start it");
        return Ok(());
    }

    let mut client = IpcClient::new(clienv::daemon_port_path(name));
    match client.ping().await {
        Ok(reply) => {
            println!("Daemon '{name}': running");
            println!("  Version:   {}", reply.version);
            println!("  Uptime:    {}", format_duration(reply.uptime_secs));
            if let Some(pid) = manager.running_pid(name) {
                println!("  PID:       {pid}");
            }
            println!("  PID file:  {}", clienv::daemon_pid_path(name).display());
            println!("  Port file: {}", clienv::daemon_port_path(name).display());
            println!("  Log file:  {}", clienv::daemon_log_path(name).display());
        }
        Err(e) => {
            println!("Daemon '{name}': unhealthy (process alive but not responding)");
            println!("  Error: {e}");
        }
    }
    client.close();
    Ok(())
}

fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}
