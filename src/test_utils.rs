//! In-memory chain used by the unit tests.
//!
//! `MockChain` answers every [`ChainClient`] call from scripted state and
//! records each broadcast (decoded back into a `TxEnvelope`) together with
//! the tokio instant it arrived, so tests can assert ordering, nonces,
//! calldata and retry spacing.

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, TxHash, U256, keccak256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;

use crate::chain::{ChainClient, Receipt};
use crate::error::ChainError;
use crate::rgen::IERC20;

/// What the chain does with a broadcast that was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mined {
    Success,
    Reverted,
    Never,
}

#[derive(Debug, Clone)]
pub struct Broadcast {
    pub raw: Bytes,
    pub tx: TxEnvelope,
    pub at: Instant,
}

impl Broadcast {
    pub fn nonce(&self) -> u64 {
        self.tx.nonce()
    }

    pub fn to(&self) -> Option<Address> {
        self.tx.to()
    }

    pub fn input(&self) -> &Bytes {
        self.tx.input()
    }

    pub fn is_approval(&self) -> bool {
        self.input().starts_with(&IERC20::approveCall::SELECTOR)
    }
}

#[derive(Default)]
struct MockState {
    nonces: HashMap<Address, u64>,
    nonce_queries: Vec<Address>,
    nonce_error: Option<String>,
    gas_estimate: Option<Result<u64, String>>,
    send_error: Option<String>,
    send_failures: VecDeque<String>,
    mined_plan: VecDeque<Mined>,
    mined: HashMap<TxHash, Mined>,
    allowances: HashMap<(Address, Address), U256>,
    grant_on_approve: HashSet<Address>,
    broadcasts: Vec<Broadcast>,
    send_attempts: usize,
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(address, nonce);
    }

    pub fn fail_nonce_queries(&self, reason: Option<&str>) {
        self.state.lock().unwrap().nonce_error = reason.map(str::to_string);
    }

    pub fn nonce_queries(&self) -> Vec<Address> {
        self.state.lock().unwrap().nonce_queries.clone()
    }

    pub fn set_gas_estimate(&self, estimate: Result<u64, String>) {
        self.state.lock().unwrap().gas_estimate = Some(estimate);
    }

    /// Every broadcast is rejected with `reason` until cleared.
    pub fn fail_all_sends(&self, reason: Option<&str>) {
        self.state.lock().unwrap().send_error = reason.map(str::to_string);
    }

    /// The next broadcast is rejected once with `reason`.
    pub fn fail_next_send(&self, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .send_failures
            .push_back(reason.to_string());
    }

    /// Outcome of the next accepted broadcasts, in order. Defaults to success.
    pub fn plan_mined(&self, outcomes: impl IntoIterator<Item = Mined>) {
        self.state.lock().unwrap().mined_plan.extend(outcomes);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, owner), amount);
    }

    /// A mined approval on `token` grants the approved value to `owner`.
    pub fn grant_on_approve(&self, owner: Address) {
        self.state.lock().unwrap().grant_on_approve.insert(owner);
    }

    pub fn broadcasts(&self) -> Vec<Broadcast> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.state.lock().unwrap().send_attempts
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.nonce_queries.push(address);
        if let Some(reason) = &state.nonce_error {
            return Err(ChainError::Rpc(reason.clone()));
        }
        Ok(state.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn estimate_gas(&self, _draft: &TransactionRequest) -> Result<u64, ChainError> {
        match self.state.lock().unwrap().gas_estimate.clone() {
            Some(Ok(gas)) => Ok(gas),
            Some(Err(reason)) => Err(ChainError::Rpc(reason)),
            None => Err(ChainError::Rpc("estimation unavailable".into())),
        }
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.send_attempts += 1;
        if let Some(reason) = state.send_failures.pop_front() {
            return Err(ChainError::Rpc(reason));
        }
        if let Some(reason) = &state.send_error {
            return Err(ChainError::Rpc(reason.clone()));
        }
        let tx = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|e| ChainError::Decode(e.to_string()))?;
        let hash = keccak256(raw);
        let mined = state.mined_plan.pop_front().unwrap_or(Mined::Success);
        state.mined.insert(hash, mined);

        if mined == Mined::Success && tx.input().starts_with(&IERC20::approveCall::SELECTOR) {
            if let (Some(token), Ok(call)) = (tx.to(), IERC20::approveCall::abi_decode(tx.input()))
            {
                let owners: Vec<_> = state.grant_on_approve.iter().copied().collect();
                for owner in owners {
                    state.allowances.insert((token, owner), call.value);
                }
            }
        }

        state.broadcasts.push(Broadcast {
            raw: Bytes::copy_from_slice(raw),
            tx,
            at: Instant::now(),
        });
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ChainError> {
        let state = self.state.lock().unwrap();
        let receipt = |success| Receipt {
            transaction_hash: hash,
            success,
            block_number: Some(1),
        };
        match state.mined.get(&hash) {
            Some(Mined::Success) => Ok(Some(receipt(true))),
            Some(Mined::Reverted) => Ok(Some(receipt(false))),
            Some(Mined::Never) | None => Ok(None),
        }
    }

    async fn call(&self, draft: &TransactionRequest) -> Result<Bytes, ChainError> {
        let input = draft
            .input
            .input()
            .ok_or_else(|| ChainError::Rpc("missing calldata".into()))?;
        let call = IERC20::allowanceCall::abi_decode(input)
            .map_err(|e| ChainError::Rpc(format!("unsupported call: {e}")))?;
        let token = draft
            .to
            .and_then(|kind| kind.to().copied())
            .ok_or_else(|| ChainError::Rpc("missing target".into()))?;
        let state = self.state.lock().unwrap();
        let allowance = state
            .allowances
            .get(&(token, call.owner))
            .copied()
            .unwrap_or_default();
        Ok(allowance.abi_encode().into())
    }
}
