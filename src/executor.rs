use alloy::primitives::{Address, TxHash};
use futures::channel::mpsc::UnboundedSender;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Pacing;
use crate::error::AppError;
use crate::events::{SwapEvent, WaitKind};
use crate::swap::{Route, RouteBook, SwapPath, TokenBook, to_base_units};
use crate::swap_manager::SwapManager;
use crate::tx_sender::{TransactionManager, TxOutcome};
use crate::wallet::Wallet;

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Swaps that confirmed.
    pub success_count: usize,
    /// Swaps that were submitted, confirmed or not.
    pub swaps_attempted: usize,
    pub cancelled: bool,
}

enum RouteResult {
    Swapped(TxOutcome),
    ApprovalFailed(String),
    Cancelled,
}

/// Drives rounds of swaps over every wallet and enabled route, one
/// transaction at a time.
pub struct SwapExecutor {
    managers: Vec<SwapManager>,
    tokens: TokenBook,
    pacing: Pacing,
    events: Option<UnboundedSender<SwapEvent>>,
}

impl SwapExecutor {
    pub fn new(
        wallets: Vec<Wallet>,
        router: Address,
        tx_manager: Arc<TransactionManager>,
        tokens: TokenBook,
        pacing: Pacing,
    ) -> Self {
        let managers = wallets
            .into_iter()
            .map(|wallet| SwapManager::new(wallet, router, tx_manager.clone()))
            .collect();
        Self {
            managers,
            tokens,
            pacing,
            events: None,
        }
    }

    /// Streams [`SwapEvent`]s to `sender` during runs.
    pub fn with_events(mut self, sender: UnboundedSender<SwapEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: SwapEvent) {
        if let Some(sender) = &self.events {
            // receiver may be gone; the run does not depend on it
            let _ = sender.unbounded_send(event);
        }
    }

    /// Runs `rounds` passes over all wallets and the routes enabled in `routes`.
    ///
    /// Cancelling `cancel` ends the run promptly: pacing waits, retry
    /// backoffs and receipt waits are cut short, and no transaction is
    /// built after the cancellation is seen.
    pub async fn run_swaps(
        &self,
        rounds: usize,
        routes: &RouteBook,
        cancel: &CancellationToken,
    ) -> RunReport {
        let enabled: Vec<&Route> = routes.enabled().collect();
        let wallets = self.managers.len();
        let mut report = RunReport::default();
        info!(rounds, wallets, routes = enabled.len(), "Starting swap run");

        for round in 0..rounds {
            self.emit(SwapEvent::RoundStarted {
                round: round + 1,
                of: rounds,
            });

            for (index, manager) in self.managers.iter().enumerate() {
                info!(wallet = %manager.address(), "Processing account {}/{}", index + 1, wallets);
                self.emit(SwapEvent::WalletStarted {
                    index: index + 1,
                    of: wallets,
                    wallet: manager.address(),
                });

                for route in &enabled {
                    if cancel.is_cancelled() {
                        return self.cancelled(report);
                    }

                    match self.process_route(manager, route, cancel).await {
                        Ok(RouteResult::Swapped(outcome)) => {
                            report.swaps_attempted += 1;
                            self.record_swap(manager, route, outcome, &mut report);
                        }
                        Ok(RouteResult::Cancelled) => return self.cancelled(report),
                        Ok(RouteResult::ApprovalFailed(reason)) => {
                            error!(wallet = %manager.address(), route = %route.name, "Failed to approve {}: {reason}", route.input);
                            self.emit(SwapEvent::ApprovalFailed {
                                wallet: manager.address(),
                                route: route.name.clone(),
                                reason,
                            });
                            continue;
                        }
                        Err(e) => {
                            error!(wallet = %manager.address(), route = %route.name, "Error processing route: {e}");
                            self.emit(SwapEvent::RouteError {
                                wallet: manager.address(),
                                route: route.name.clone(),
                                reason: e.to_string(),
                            });
                            continue;
                        }
                    }

                    if cancel.is_cancelled()
                        || !self
                            .pause(WaitKind::NextSwap, self.pacing.swap_delay, cancel)
                            .await
                    {
                        return self.cancelled(report);
                    }
                }

                if index + 1 < wallets
                    && !self
                        .pause(WaitKind::NextWallet, self.pacing.wallet_delay, cancel)
                        .await
                {
                    return self.cancelled(report);
                }
            }
        }

        info!(
            success = report.success_count,
            attempted = report.swaps_attempted,
            "Swap run finished"
        );
        report
    }

    async fn process_route(
        &self,
        manager: &SwapManager,
        route: &Route,
        cancel: &CancellationToken,
    ) -> Result<RouteResult, AppError> {
        let input = self.tokens.resolve(&route.input)?;
        let output = self.tokens.resolve(&route.output)?;
        let amount = to_base_units(&route.amount, input.decimals)?;

        let allowance = manager.allowance(input.address, manager.router()).await?;
        if allowance < amount {
            info!(wallet = %manager.address(), "Approving {} for swap...", route.input);
            self.emit(SwapEvent::Approving {
                wallet: manager.address(),
                route: route.name.clone(),
            });
            let outcome = manager
                .approve_token(input.address, manager.router(), amount, cancel)
                .await;
            if cancel.is_cancelled() {
                return Ok(RouteResult::Cancelled);
            }
            match outcome {
                TxOutcome::Confirmed(_) => {}
                TxOutcome::Failed(reason) => return Ok(RouteResult::ApprovalFailed(reason)),
                TxOutcome::Pending(hash) => {
                    return Ok(RouteResult::ApprovalFailed(pending_reason(hash)));
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(RouteResult::Cancelled);
        }
        let path = SwapPath::direct(input.address, output.address);
        Ok(RouteResult::Swapped(
            manager.execute_swap(route, amount, path, cancel).await,
        ))
    }

    fn record_swap(
        &self,
        manager: &SwapManager,
        route: &Route,
        outcome: TxOutcome,
        report: &mut RunReport,
    ) {
        let wallet = manager.address();
        match outcome {
            TxOutcome::Confirmed(tx) => {
                report.success_count += 1;
                info!(%wallet, %tx, "Swap successful. Type: {}, Amount: {} {}", route.name, route.amount, route.input);
                self.emit(SwapEvent::SwapConfirmed {
                    wallet,
                    route: route.name.clone(),
                    tx,
                });
            }
            TxOutcome::Failed(reason) => self.swap_failed(wallet, route, reason),
            TxOutcome::Pending(hash) => self.swap_failed(wallet, route, pending_reason(hash)),
        }
    }

    fn swap_failed(&self, wallet: Address, route: &Route, reason: String) {
        warn!(%wallet, route = %route.name, "Swap failed: {reason}");
        self.emit(SwapEvent::SwapFailed {
            wallet,
            route: route.name.clone(),
            reason,
        });
    }

    /// Sleeps a random duration within `bounds`. Returns false if cancelled.
    async fn pause(
        &self,
        kind: WaitKind,
        bounds: (Duration, Duration),
        cancel: &CancellationToken,
    ) -> bool {
        let duration = pick_delay(bounds);
        self.emit(SwapEvent::Waiting { kind, duration });
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }

    fn cancelled(&self, mut report: RunReport) -> RunReport {
        report.cancelled = true;
        warn!(completed = report.success_count, "Swap run cancelled");
        self.emit(SwapEvent::Cancelled {
            completed: report.success_count,
        });
        report
    }
}

fn pending_reason(hash: TxHash) -> String {
    format!("{hash} still pending")
}

/// Uniform pick in `[lo, hi]`.
pub fn pick_delay((lo, hi): (Duration, Duration)) -> Duration {
    if hi <= lo {
        return lo;
    }
    rand::thread_rng().gen_range(lo..=hi)
}
