use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use url::Url;

use crate::error::ChainError;

/// Outcome record of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// The JSON-RPC calls the runner depends on.
///
/// Every call is a single request; retrying and waiting are left to the
/// caller so that the policies live in one place.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `eth_getTransactionCount` at the latest block.
    async fn transaction_count(&self, address: Address) -> Result<u64, ChainError>;

    async fn estimate_gas(&self, draft: &TransactionRequest) -> Result<u64, ChainError>;

    /// Broadcasts an EIP-2718 encoded signed transaction.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError>;

    /// One receipt lookup. `None` while the transaction is not mined.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ChainError>;

    /// Read-only `eth_call` returning the raw return data.
    async fn call(&self, draft: &TransactionRequest) -> Result<Bytes, ChainError>;
}

/// [`ChainClient`] over an alloy HTTP provider.
#[derive(Clone)]
pub struct AlloyChainClient {
    provider: RootProvider<Ethereum>,
}

impl AlloyChainClient {
    pub fn connect_http(url: Url) -> Self {
        Self {
            provider: RootProvider::new_http(url),
        }
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider.get_chain_id().await.map_err(rpc_error)
    }
}

fn rpc_error(err: impl std::fmt::Display) -> ChainError {
    ChainError::Rpc(err.to_string())
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        self.provider
            .get_transaction_count(address)
            .await
            .map_err(rpc_error)
    }

    async fn estimate_gas(&self, draft: &TransactionRequest) -> Result<u64, ChainError> {
        self.provider
            .estimate_gas(draft.clone())
            .await
            .map_err(rpc_error)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(rpc_error)?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ChainError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(rpc_error)?;
        Ok(receipt.map(|inner| Receipt {
            transaction_hash: ReceiptResponse::transaction_hash(&inner),
            success: ReceiptResponse::status(&inner),
            block_number: ReceiptResponse::block_number(&inner),
        }))
    }

    async fn call(&self, draft: &TransactionRequest) -> Result<Bytes, ChainError> {
        self.provider.call(draft.clone()).await.map_err(rpc_error)
    }
}
