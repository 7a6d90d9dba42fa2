use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use swapwise::config::Settings;
use swapwise::ignition::ignite;
use swapwise::logging::setup_logging;
use swapwise::menu::run_menu;

#[derive(Parser, Debug)]
#[command(name = "swapwise", version, about = "Timed multi-wallet DEX swap runner")]
struct Cli {
    /// Settings file with private keys and gas overrides
    #[arg(long, env = "SWAPWISE_CONFIG", default_value = "privateKeys.json")]
    config: PathBuf,

    /// Override the RPC endpoint
    #[arg(long, env = "SWAPWISE_RPC_URL")]
    rpc_url: Option<String>,

    /// Run this many rounds with every route enabled, then exit
    #[arg(long)]
    rounds: Option<usize>,

    #[arg(long, env = "SWAPWISE_LOG", default_value = "info")]
    log_level: String,

    #[arg(long)]
    json_logs: bool,
}

/// Entry point: load settings, bootstrap, then hand over to the menu
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.json_logs);

    let mut settings = Settings::from_file(&cli.config).context("Failed to load settings")?;
    if let Some(url) = &cli.rpc_url {
        settings = settings.with_rpc_url(url)?;
    }

    let app = ignite(settings).await?;

    match cli.rounds {
        Some(rounds) => {
            let routes = app.routes.clone();
            let report = app.run(rounds, &routes).await;
            info!(
                success = report.success_count,
                attempted = report.swaps_attempted,
                cancelled = report.cancelled,
                "Completed {} successful swaps",
                report.success_count
            );
        }
        None => run_menu(app).await?,
    }

    Ok(())
}
