use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{SolCall, SolValue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::constants::SWAP_DEADLINE_SECS;
use crate::error::{AppError, ChainError};
use crate::rgen::{IERC20, IRouter};
use crate::swap::{Route, SwapPath};
use crate::tx_sender::{TransactionManager, TxOutcome};
use crate::wallet::Wallet;

/// Builds, signs and submits approval and swap transactions for one wallet.
pub struct SwapManager {
    wallet: Wallet,
    router: Address,
    tx_manager: Arc<TransactionManager>,
}

impl SwapManager {
    pub fn new(wallet: Wallet, router: Address, tx_manager: Arc<TransactionManager>) -> Self {
        Self {
            wallet,
            router,
            tx_manager,
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn router(&self) -> Address {
        self.router
    }

    /// Current ERC20 allowance from this wallet to `spender`.
    pub async fn allowance(&self, token: Address, spender: Address) -> Result<U256, AppError> {
        let call = IERC20::allowanceCall {
            owner: self.address(),
            spender,
        };
        let request = TransactionRequest::default()
            .with_to(token)
            .with_input(call.abi_encode());
        let raw = self.tx_manager.client().call(&request).await?;
        U256::abi_decode(&raw).map_err(|e| ChainError::Decode(e.to_string()).into())
    }

    /// Approves `spender` for the maximum allowance on `token`.
    ///
    /// `amount` is what the caller is about to spend; it is logged but the
    /// approval is always `U256::MAX` so later swaps reuse it. Uses the
    /// static gas limit. Errors become [`TxOutcome::Failed`].
    pub async fn approve_token(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        cancel: &CancellationToken,
    ) -> TxOutcome {
        let call = IERC20::approveCall {
            spender,
            value: U256::MAX,
        };
        let request = self.base_request(token, call.abi_encode());
        let gas_limit = self.tx_manager.gas_station().fallback_gas_limit();

        match self.sign_and_submit(request, gas_limit, cancel).await {
            Ok(outcome) => {
                if let Some(hash) = outcome.confirmed_hash() {
                    info!(wallet = %self.address(), %token, %spender, needed = %amount, tx = %hash, "Token approved");
                }
                outcome
            }
            Err(e) => {
                error!(wallet = %self.address(), %token, "Error approving token: {e}");
                TxOutcome::Failed(e.to_string())
            }
        }
    }

    /// Swaps `amount_in` along `path` through the router with no minimum
    /// output and a deadline ten minutes out. Gas is estimated with the
    /// configured buffer. Errors become [`TxOutcome::Failed`].
    pub async fn execute_swap(
        &self,
        route: &Route,
        amount_in: U256,
        path: SwapPath,
        cancel: &CancellationToken,
    ) -> TxOutcome {
        let deadline = chrono::Utc::now().timestamp().max(0) as u64 + SWAP_DEADLINE_SECS;
        let call = IRouter::swapExactTokensForTokensCall {
            amountIn: amount_in,
            amountOutMin: U256::ZERO,
            path: path.into(),
            to: self.address(),
            deadline: U256::from(deadline),
        };
        let request = self.base_request(self.router, call.abi_encode());
        let gas_limit = self
            .tx_manager
            .estimate_gas(&request, self.tx_manager.settings().gas_buffer_percent)
            .await;

        match self.sign_and_submit(request, gas_limit, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(wallet = %self.address(), route = %route.name, "Error executing swap: {e}");
                TxOutcome::Failed(e.to_string())
            }
        }
    }

    fn base_request(&self, to: Address, input: Vec<u8>) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.address())
            .with_to(to)
            .with_value(U256::ZERO)
            .with_chain_id(self.tx_manager.settings().chain_id)
            .with_input(input)
    }

    async fn sign_and_submit(
        &self,
        request: TransactionRequest,
        gas_limit: u64,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome, AppError> {
        let nonce = self.tx_manager.next_nonce(self.address()).await?;
        let request = request
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(self.tx_manager.gas_station().gas_price());
        let signed = self.tx_manager.sign(&self.wallet, request).await?;
        let max_attempts = self.tx_manager.settings().max_attempts;
        Ok(self.tx_manager.submit_with_retry(&signed, max_attempts, cancel)
            .await)
    }
}
