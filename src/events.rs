use alloy::primitives::{Address, TxHash};
use std::time::Duration;

/// Progress messages emitted by the executor while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapEvent {
    /// Round (1-based) of total.
    RoundStarted { round: usize, of: usize },

    /// Wallet (1-based) of total.
    WalletStarted { index: usize, of: usize, wallet: Address },

    /// Allowance below the swap amount; approval about to be sent.
    Approving { wallet: Address, route: String },

    /// Approval did not confirm; the route is skipped for this wallet and round.
    ApprovalFailed { wallet: Address, route: String, reason: String },

    SwapConfirmed { wallet: Address, route: String, tx: TxHash },

    SwapFailed { wallet: Address, route: String, reason: String },

    /// Anything else that went wrong while processing a route.
    RouteError { wallet: Address, route: String, reason: String },

    /// Pacing wait started.
    Waiting { kind: WaitKind, duration: Duration },

    /// Run stopped early with this many confirmed swaps.
    Cancelled { completed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    NextSwap,
    NextWallet,
}
