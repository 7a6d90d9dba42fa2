//! Library root for swapwise crate.
//!
//! Repeated token swaps against one router, for many wallets, on a timed loop.

pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod executor;
pub mod gas_station;
pub mod ignition;
pub mod logging;
pub mod menu;
pub mod rgen;
pub mod swap;
pub mod swap_manager;
pub mod tx_sender;
pub mod wallet;

#[cfg(test)]
mod test_utils;

pub use chain::{AlloyChainClient, ChainClient};
pub use config::Settings;
pub use error::{AppError, ChainError};
pub use executor::{RunReport, SwapExecutor};
pub use swap_manager::SwapManager;
pub use tx_sender::{TransactionManager, TxOutcome};
