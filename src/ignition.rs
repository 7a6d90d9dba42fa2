use alloy::primitives::Address;
use anyhow::{Context, Result};
use futures::channel::mpsc;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chain::AlloyChainClient;
use crate::config::Settings;
use crate::executor::{RunReport, SwapExecutor};
use crate::menu::print_events;
use crate::swap::{RouteBook, TokenBook, to_base_units};
use crate::tx_sender::TransactionManager;
use crate::wallet::load_wallets;

/// Everything a run needs, built once from [`Settings`].
pub struct App {
    pub executor: SwapExecutor,
    /// Route table as configured; callers toggle their own copy.
    pub routes: RouteBook,
}

/// Bootstraps wallets, provider, transaction manager and executor.
pub async fn ignite(settings: Settings) -> Result<App> {
    let wallets = load_wallets(settings.private_keys.iter()).context("Error creating accounts")?;
    let addresses: Vec<Address> = wallets.iter().map(|w| w.address()).collect();
    info!("Loaded {} accounts successfully", addresses.len());
    for (i, address) in addresses.iter().enumerate() {
        info!("Account {}: {}", i + 1, address);
    }

    let tokens = TokenBook::reference();
    let routes = configured_routes(&settings, &tokens)?;

    let client = AlloyChainClient::connect_http(settings.network.rpc_url.clone());
    match client.chain_id().await {
        Ok(id) if id == settings.network.chain_id => {
            info!(chain_id = id, rpc = %settings.network.rpc_url, "Connected to RPC");
        }
        Ok(id) => warn!(
            expected = settings.network.chain_id,
            actual = id,
            "RPC reports a different chain id; transactions are signed for the configured one"
        ),
        Err(e) => warn!(rpc = %settings.network.rpc_url, "Could not query chain id: {e}"),
    }

    let tx_manager = Arc::new(TransactionManager::new(Arc::new(client), settings.tx));

    let (event_tx, event_rx) = mpsc::unbounded();
    tokio::spawn(print_events(event_rx));

    let executor = SwapExecutor::new(
        wallets,
        settings.network.router,
        tx_manager,
        tokens,
        settings.pacing,
    )
    .with_events(event_tx);

    Ok(App { executor, routes })
}

fn configured_routes(settings: &Settings, tokens: &TokenBook) -> Result<RouteBook> {
    let mut routes = RouteBook::reference();
    for (name, amount) in &settings.route_amounts {
        if !routes.set_amount(name, amount.clone()) {
            warn!(route = %name, "Ignoring amount override for unknown route");
        }
    }
    for route in routes.all() {
        let input = tokens.resolve(&route.input)?;
        tokens.resolve(&route.output)?;
        to_base_units(&route.amount, input.decimals)
            .with_context(|| format!("Invalid amount for route {}", route.name))?;
    }
    Ok(routes)
}

impl App {
    /// Runs `rounds` rounds over `routes`; Ctrl-C cancels the run and the
    /// partial report is returned.
    pub async fn run(&self, rounds: usize, routes: &RouteBook) -> RunReport {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Bot stopped by user");
                        cancel.cancel();
                    }
                    Err(e) => error!("Failed to listen for shutdown: {e:?}"),
                }
            })
        };

        let report = self.executor.run_swaps(rounds, routes, &cancel).await;
        watcher.abort();
        report
    }
}
