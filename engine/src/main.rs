use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use opt_core::EngineConfig;
use opt_observability::{canonical_logs_dir_from_state_dir, init_process_logging};
use opt_server::{serve, AppState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "optimiser-engine")]
#[command(about = "Optimisation coordinator service")]
struct Cli {
    #[arg(long, alias = "host", default_value = "127.0.0.1")]
    hostname: String,
    #[arg(long, default_value_t = 8000)]
    port: u16,
    #[arg(long, default_value_t = 14)]
    log_retention_days: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let engine_config = EngineConfig::from_env();
    let logs_dir = canonical_logs_dir_from_state_dir(&engine_config.state_dir());
    let (_guard, info) = init_process_logging(&logs_dir, cli.log_retention_days)?;

    let addr: SocketAddr = format!("{}:{}", cli.hostname, cli.port)
        .parse()
        .context("invalid hostname or port")?;

    info!(logs_dir = %info.logs_dir, "logging initialized");

    let state = AppState::new(engine_config);
    state
        .sessions
        .load_all()
        .await
        .context("failed to load persisted sessions")?;
    serve(addr, state).await?;

    Ok(())
}
