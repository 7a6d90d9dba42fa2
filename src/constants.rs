use alloy::primitives::{Address, address};
use std::time::Duration;

// Reference deployment: InitVerse Genesis testnet
pub const RPC_URL: &str = "https://rpc-testnet.iniscan.com";
pub const CHAIN_ID: u64 = 233;
pub const ROUTER_ADDRESS: Address = address!("4ccB784744969D9B63C15cF07E622DDA65A88Ee7");

/// (symbol, contract, decimals)
pub const TOKENS: [(&str, Address, u8); 3] = [
    ("USDT", address!("36AA81a7aEeAB8f09e154d3E779Bb81beA54501A"), 18),
    ("INI", address!("9e66cd15226464EFBa8b7B2847A0880AFC236c5C"), 18),
    ("TOKEN", address!("cF259Bca0315C6D32e877793B6a10e97e7647FdE"), 18),
];

/// (name, input symbol, output symbol, amount in natural units)
pub const ROUTES: [(&str, &str, &str, &str); 4] = [
    ("INI to TOKEN", "INI", "TOKEN", "0.01"),
    ("INI to USDT", "INI", "USDT", "0.01"),
    ("USDT to INI", "USDT", "INI", "0.006"),
    ("TOKEN to INI", "TOKEN", "INI", "0.006"),
];

pub const DEFAULT_GAS_LIMIT: u64 = 200_000;
pub const DEFAULT_GAS_PRICE_GWEI: u64 = 10;
pub const DEFAULT_GAS_BUFFER_PERCENT: u64 = 10;
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Seconds added to the current time for the router deadline.
pub const SWAP_DEADLINE_SECS: u64 = 600;

pub const SWAP_DELAY_SECS: (u64, u64) = (610, 650);
pub const WALLET_DELAY_SECS: (u64, u64) = (30, 60);

pub const GWEI: u128 = 1_000_000_000;
