//! Plotline daemon: entry point for the settlement engine service.

mod config;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use plotline_market::MarketEngine;
use plotline_rpc::RpcServer;
use plotline_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment, Migrator};
use plotline_types::SystemClock;
use plotline_utils::{init_logging, LogFormat};

use crate::config::DaemonConfig;

#[derive(Parser)]
#[command(name = "plotline-daemon", about = "Plotline chapter market settlement daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "PLOTLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for ledger storage.
    #[arg(long, env = "PLOTLINE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// RPC server port.
    #[arg(long, env = "PLOTLINE_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "PLOTLINE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "PLOTLINE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Open the ledger and serve the RPC API.
    Run,
    /// Open the ledger, run migrations and the integrity check, then exit.
    Check,
}

impl Cli {
    fn resolve_config(&self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_toml_file(path)?,
            None => DaemonConfig::default(),
        };
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Open the LMDB environment and bring it to the current schema.
fn open_ledger(config: &DaemonConfig) -> anyhow::Result<LmdbEnvironment> {
    check_data_dir(&config.data_dir).map_err(anyhow::Error::msg)?;
    let env = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())
        .with_context(|| format!("opening ledger at {}", config.data_dir.display()))?;
    Migrator::run(&env.meta_store())?;

    let report = check_integrity(&env)?;
    tracing::info!(
        databases = report.databases_checked,
        entries = report.total_entries,
        "integrity check finished"
    );
    if !report.is_healthy() {
        for error in &report.errors {
            tracing::error!(%error, "integrity check failed");
        }
        anyhow::bail!(
            "ledger at {} failed its integrity check ({} errors)",
            config.data_dir.display(),
            report.errors.len()
        );
    }
    Ok(env)
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let env = open_ledger(&config)?;
    let engine = Arc::new(MarketEngine::new(env, SystemClock, config.market.clone())?);

    tracing::info!(
        rpc = %config.rpc_addr(),
        fee_bps = config.market.fee_bps,
        winner_bps = config.market.winner_bps,
        "starting plotline settlement daemon"
    );
    RpcServer::new(engine, config.rpc_addr())
        .start(shutdown::wait_for_signal())
        .await?;

    tracing::info!("plotline daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(config.log_format, &config.log_level);

    match cli.command {
        Command::Run => run(config).await,
        Command::Check => {
            open_ledger(&config)?;
            tracing::info!(data_dir = %config.data_dir.display(), "ledger is healthy");
            Ok(())
        }
    }
}
