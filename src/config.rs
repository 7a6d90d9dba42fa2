use alloy::primitives::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::constants;
use crate::error::AppError;
use crate::gas_station::gwei_to_wei;

/// The one chain a process talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub rpc_url: Url,
    pub chain_id: u64,
    pub router: Address,
}

impl Network {
    pub fn reference() -> Result<Self, AppError> {
        Ok(Self {
            rpc_url: parse_url(constants::RPC_URL)?,
            chain_id: constants::CHAIN_ID,
            router: constants::ROUTER_ADDRESS,
        })
    }
}

/// Transaction lifecycle knobs shared by every wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSettings {
    pub chain_id: u64,
    pub gas_limit: u64,
    /// Legacy gas price, already converted from gwei.
    pub gas_price_wei: u128,
    pub gas_buffer_percent: u64,
    pub max_attempts: usize,
    pub retry_delay: Duration,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for TxSettings {
    fn default() -> Self {
        Self {
            chain_id: constants::CHAIN_ID,
            gas_limit: constants::DEFAULT_GAS_LIMIT,
            gas_price_wei: u128::from(constants::DEFAULT_GAS_PRICE_GWEI) * constants::GWEI,
            gas_buffer_percent: constants::DEFAULT_GAS_BUFFER_PERCENT,
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            retry_delay: constants::DEFAULT_RETRY_DELAY,
            receipt_timeout: constants::RECEIPT_TIMEOUT,
            receipt_poll_interval: constants::RECEIPT_POLL_INTERVAL,
        }
    }
}

/// Inclusive bounds for the random waits between swaps and between wallets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub swap_delay: (Duration, Duration),
    pub wallet_delay: (Duration, Duration),
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            swap_delay: (Duration::ZERO, Duration::ZERO),
            wallet_delay: (Duration::ZERO, Duration::ZERO),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        let secs = |(lo, hi): (u64, u64)| (Duration::from_secs(lo), Duration::from_secs(hi));
        Self {
            swap_delay: secs(constants::SWAP_DELAY_SECS),
            wallet_delay: secs(constants::WALLET_DELAY_SECS),
        }
    }
}

/// Hex private keys, `0x` prefixed. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeys(Vec<String>);

impl PrivateKeys {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PrivateKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKeys([{} redacted])", self.0.len())
    }
}

/// Immutable settings assembled once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub network: Network,
    pub private_keys: PrivateKeys,
    pub tx: TxSettings,
    pub pacing: Pacing,
    /// Route name -> amount override in natural units.
    pub route_amounts: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    private_keys: Vec<String>,
    #[serde(default = "default_gas_limit")]
    gas_limit: u64,
    /// Decimal gwei, e.g. `10` or `0.5`.
    gas_price_gwei: Option<serde_json::Number>,
    gas_buffer_percent: Option<u64>,
    max_attempts: Option<usize>,
    retry_delay_secs: Option<u64>,
    receipt_timeout_secs: Option<u64>,
    swap_delay_secs: Option<(u64, u64)>,
    wallet_delay_secs: Option<(u64, u64)>,
    rpc_url: Option<String>,
    #[serde(default)]
    route_amounts: HashMap<String, String>,
}

fn default_gas_limit() -> u64 {
    constants::DEFAULT_GAS_LIMIT
}

fn parse_url(raw: &str) -> Result<Url, AppError> {
    Url::parse(raw).map_err(|e| AppError::Config(format!("Invalid RPC URL {raw}: {e}")))
}

fn delay_bounds(name: &str, (lo, hi): (u64, u64)) -> Result<(Duration, Duration), AppError> {
    if lo > hi {
        return Err(AppError::Config(format!(
            "{name} lower bound {lo} exceeds upper bound {hi}"
        )));
    }
    Ok((Duration::from_secs(lo), Duration::from_secs(hi)))
}

/// Adds the `0x` prefix where missing and drops blank entries.
pub fn normalize_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .map(|k| if k.starts_with("0x") { k } else { format!("0x{k}") })
        .collect()
}

impl Settings {
    /// Loads the settings file. A missing file or an empty key list is fatal.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::Config(format!("{} not found", path.display())));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_json(&raw).map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let file: SettingsFile = serde_json::from_str(raw)?;

        let keys = normalize_keys(&file.private_keys);
        if keys.is_empty() {
            return Err(AppError::Config("No valid private keys found".into()));
        }

        let mut network = Network::reference()?;
        if let Some(url) = file.rpc_url.as_deref() {
            network.rpc_url = parse_url(url)?;
        }

        let defaults = TxSettings::default();
        let max_attempts = file.max_attempts.unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(AppError::Config("max_attempts must be at least 1".into()));
        }
        let gas_price_wei = match &file.gas_price_gwei {
            Some(gwei) => gwei_to_wei(&gwei.to_string())?,
            None => defaults.gas_price_wei,
        };
        let tx = TxSettings {
            chain_id: network.chain_id,
            gas_limit: file.gas_limit,
            gas_price_wei,
            gas_buffer_percent: file.gas_buffer_percent.unwrap_or(defaults.gas_buffer_percent),
            max_attempts,
            retry_delay: file
                .retry_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
            receipt_timeout: file
                .receipt_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.receipt_timeout),
            receipt_poll_interval: defaults.receipt_poll_interval,
        };

        let mut pacing = Pacing::default();
        if let Some(bounds) = file.swap_delay_secs {
            pacing.swap_delay = delay_bounds("swap_delay_secs", bounds)?;
        }
        if let Some(bounds) = file.wallet_delay_secs {
            pacing.wallet_delay = delay_bounds("wallet_delay_secs", bounds)?;
        }

        Ok(Self {
            network,
            private_keys: PrivateKeys(keys),
            tx,
            pacing,
            route_amounts: file.route_amounts,
        })
    }

    /// Replaces the RPC endpoint, e.g. from the command line.
    pub fn with_rpc_url(mut self, raw: &str) -> Result<Self, AppError> {
        self.network.rpc_url = parse_url(raw)?;
        Ok(self)
    }
}
