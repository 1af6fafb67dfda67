use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "skillhost")]
#[command(version)]
#[command(about = "Skill host runtime and daemon manager", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Manage the background daemon
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },

    /// Inspect installed skills
    Skill {
        #[command(subcommand)]
        command: SkillCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum DaemonCommands {
    /// Run the daemon in the foreground (Ctrl+C to stop)
    Run {
        /// Daemon name (one PID/port record pair per name)
        #[arg(long, default_value = "skillhost")]
        name: String,
    },

    /// Start the daemon detached from this terminal
    Start {
        #[arg(long, default_value = "skillhost")]
        name: String,
    },

    /// Stop the daemon
    Stop {
        #[arg(long, default_value = "skillhost")]
        name: String,

        /// Kill without asking the daemon to shut down gracefully
        #[arg(long)]
        force: bool,
    },

    /// Restart the daemon
    Restart {
        #[arg(long, default_value = "skillhost")]
        name: String,
    },

    /// Show daemon health and uptime
    Status {
        #[arg(long, default_value = "skillhost")]
        name: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum SkillCommands {
    /// List discovered skills and their dependencies
    List,

    /// Show the resolved activation order
    Order,
}
