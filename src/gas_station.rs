use alloy::primitives::utils::parse_units;
use alloy::rpc::types::TransactionRequest;
use tracing::{debug, warn};

use crate::chain::ChainClient;
use crate::error::AppError;

/// Fixed-price gas policy with buffered limit estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasStation {
    fallback_gas_limit: u64,
    gas_price_wei: u128,
}

impl GasStation {
    pub fn new(fallback_gas_limit: u64, gas_price_wei: u128) -> Self {
        Self {
            fallback_gas_limit,
            gas_price_wei,
        }
    }

    /// Legacy gas price applied to every transaction.
    pub fn gas_price(&self) -> u128 {
        self.gas_price_wei
    }

    /// Static limit used when no estimate is wanted or available.
    pub fn fallback_gas_limit(&self) -> u64 {
        self.fallback_gas_limit
    }

    /// Asks the node for an estimate and pads it by `buffer_percent`.
    /// Any estimation failure degrades to the fallback limit.
    pub async fn estimate<C>(&self, client: &C, draft: &TransactionRequest, buffer_percent: u64) -> u64
    where
        C: ChainClient + ?Sized,
    {
        match client.estimate_gas(draft).await {
            Ok(estimate) => {
                let limit = with_buffer(estimate, buffer_percent);
                debug!(target: "gas_station", estimate, limit, buffer_percent, "Estimated gas");
                limit
            }
            Err(e) => {
                warn!(
                    target: "gas_station",
                    fallback = self.fallback_gas_limit,
                    "Failed to estimate gas: {e}"
                );
                self.fallback_gas_limit
            }
        }
    }
}

/// Converts a decimal gwei amount such as `"10"` or `"0.5"` to wei.
pub fn gwei_to_wei(gwei: &str) -> Result<u128, AppError> {
    let gwei = gwei.trim();
    let invalid = |reason: String| AppError::Config(format!("Invalid gas price {gwei} gwei: {reason}"));
    if gwei.starts_with('-') {
        return Err(invalid("must not be negative".into()));
    }
    let wei = parse_units(gwei, "gwei")
        .map_err(|e| invalid(e.to_string()))?
        .get_absolute();
    if wei.is_zero() {
        return Err(invalid("must be greater than zero".into()));
    }
    u128::try_from(wei).map_err(|_| invalid("too large".into()))
}

/// `ceil(estimate * (100 + buffer_percent) / 100)`, saturating.
pub fn with_buffer(estimate: u64, buffer_percent: u64) -> u64 {
    let scaled = u128::from(estimate) * u128::from(100 + buffer_percent.min(u64::MAX - 100));
    u64::try_from(scaled.div_ceil(100)).unwrap_or(u64::MAX)
}
