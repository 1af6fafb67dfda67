mod args;
mod cmd_daemon;
mod cmd_skill;

use args::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon { command } => cmd_daemon::cmd_daemon(command).await?,
        Commands::Skill { command } => cmd_skill::cmd_skill(command).await?,
    }

    Ok(())
}

fn init_tracing() {
    let filter = skillhost::clienv::log_filter()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new("skillhost=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
