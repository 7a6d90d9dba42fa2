use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::config::TxSettings;
use crate::error::AppError;
use crate::gas_station::GasStation;
use crate::wallet::Wallet;

/// Terminal (or last observed) state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Mined with a successful status.
    Confirmed(TxHash),
    /// Rejected, reverted, or out of attempts.
    Failed(String),
    /// Broadcast but no receipt within the wait window.
    Pending(TxHash),
}

impl TxOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TxOutcome::Confirmed(_))
    }

    /// Hash of a confirmed transaction only.
    pub fn confirmed_hash(&self) -> Option<TxHash> {
        match self {
            TxOutcome::Confirmed(hash) => Some(*hash),
            _ => None,
        }
    }
}

/// A signed, encoded transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: TxHash,
    pub nonce: u64,
    pub raw: Bytes,
}

/// Nonce cache, gas policy and retrying submission for every wallet.
pub struct TransactionManager {
    client: Arc<dyn ChainClient>,
    gas_station: GasStation,
    settings: TxSettings,
    nonces: DashMap<Address, Arc<Mutex<Option<u64>>>>,
}

impl TransactionManager {
    pub fn new(client: Arc<dyn ChainClient>, settings: TxSettings) -> Self {
        Self {
            client,
            gas_station: GasStation::new(settings.gas_limit, settings.gas_price_wei),
            settings,
            nonces: DashMap::new(),
        }
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn settings(&self) -> &TxSettings {
        &self.settings
    }

    pub fn gas_station(&self) -> &GasStation {
        &self.gas_station
    }

    /// Next nonce for `address`.
    ///
    /// The first call per address reads the on-chain transaction count; every
    /// later call increments the local counter without touching the chain.
    /// A failed read is returned to the caller and nothing is cached.
    pub async fn next_nonce(&self, address: Address) -> Result<u64, AppError> {
        let slot = self.nonces.entry(address).or_default().clone();
        let mut cached = slot.lock().await;

        let nonce = match *cached {
            Some(nonce) => nonce,
            None => {
                let on_chain = self.client.transaction_count(address).await?;
                debug!(wallet = %address, nonce = on_chain, "Initialized nonce from chain");
                on_chain
            }
        };
        *cached = Some(nonce + 1);
        Ok(nonce)
    }

    /// Buffered gas limit for `draft`, or the static limit if estimation fails.
    pub async fn estimate_gas(&self, draft: &TransactionRequest, buffer_percent: u64) -> u64 {
        self.gas_station
            .estimate(self.client.as_ref(), draft, buffer_percent)
            .await
    }

    /// Signs a fully specified request. Gas limit and price must already be set.
    pub async fn sign(
        &self,
        wallet: &Wallet,
        request: TransactionRequest,
    ) -> Result<SignedTransaction, AppError> {
        let nonce = request
            .nonce
            .ok_or_else(|| AppError::Signing("nonce not set".into()))?;
        if request.gas.is_none() || request.gas_price.is_none() {
            return Err(AppError::Signing("gas limit and gas price must be fixed".into()));
        }
        let envelope = request
            .build(wallet.signer())
            .await
            .map_err(|e| AppError::Signing(e.to_string()))?;
        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            nonce,
            raw: envelope.encoded_2718().into(),
        })
    }

    /// Broadcasts `signed` and waits for its receipt, retrying the same payload
    /// with linear backoff (`retry_delay * attempt`) on any failure.
    ///
    /// Never returns an error: after the last attempt the outcome is
    /// [`TxOutcome::Failed`]. Cancelling `cancel` stops the receipt wait and
    /// any further attempt; a payload already broadcast is reported as
    /// [`TxOutcome::Pending`].
    pub async fn submit_with_retry(
        &self,
        signed: &SignedTransaction,
        max_attempts: usize,
        cancel: &CancellationToken,
    ) -> TxOutcome {
        let attempts = max_attempts.max(1);
        let mut last_failure = String::new();

        for attempt in 0..attempts {
            let outcome = self.broadcast_and_confirm(signed, cancel).await;
            if cancel.is_cancelled() && !outcome.is_confirmed() {
                warn!(tx = %signed.hash, attempt = attempt + 1, "Submission cancelled");
                return outcome;
            }
            match outcome {
                TxOutcome::Confirmed(hash) => {
                    info!(tx = %hash, nonce = signed.nonce, "Transaction confirmed");
                    return TxOutcome::Confirmed(hash);
                }
                TxOutcome::Failed(reason) => last_failure = reason,
                TxOutcome::Pending(hash) => {
                    last_failure = format!(
                        "no receipt for {hash} within {}s",
                        self.settings.receipt_timeout.as_secs()
                    )
                }
            }

            if attempt + 1 < attempts {
                let delay = self.settings.retry_delay * (attempt as u32 + 1);
                warn!(
                    tx = %signed.hash,
                    attempt = attempt + 1,
                    of = attempts,
                    "Transaction attempt failed: {last_failure}; retrying in {delay:?}"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(tx = %signed.hash, "Retry cancelled");
                        return TxOutcome::Failed(format!("cancelled after: {last_failure}"));
                    }
                    _ = sleep(delay) => {}
                }
            }
        }

        error!(tx = %signed.hash, "Transaction failed after {attempts} attempts: {last_failure}");
        TxOutcome::Failed(last_failure)
    }

    async fn broadcast_and_confirm(
        &self,
        signed: &SignedTransaction,
        cancel: &CancellationToken,
    ) -> TxOutcome {
        match self.client.send_raw_transaction(&signed.raw).await {
            Ok(hash) => {
                debug!(tx = %hash, nonce = signed.nonce, "Broadcast transaction");
                self.wait_for_receipt(hash, cancel).await
            }
            Err(e) => TxOutcome::Failed(format!("broadcast rejected: {e}")),
        }
    }

    /// Polls for the receipt until it shows up, the lookup fails, the
    /// receipt timeout elapses, or `cancel` fires.
    pub async fn wait_for_receipt(&self, hash: TxHash, cancel: &CancellationToken) -> TxOutcome {
        let poll = async {
            loop {
                match self.client.transaction_receipt(hash).await {
                    Ok(Some(receipt)) if receipt.success => {
                        debug!(tx = %hash, block = ?receipt.block_number, "Receipt received");
                        return TxOutcome::Confirmed(hash);
                    }
                    Ok(Some(receipt)) => {
                        return TxOutcome::Failed(format!(
                            "transaction {hash} reverted in block {:?}",
                            receipt.block_number
                        ));
                    }
                    Ok(None) => sleep(self.settings.receipt_poll_interval).await,
                    Err(e) => return TxOutcome::Failed(format!("receipt lookup failed: {e}")),
                }
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => TxOutcome::Pending(hash),
            waited = timeout(self.settings.receipt_timeout, poll) => {
                waited.unwrap_or(TxOutcome::Pending(hash))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Mined, MockChain};
    use alloy::primitives::{U256, address};
    use alloy::signers::local::PrivateKeySigner;
    use std::time::Duration;

    fn manager(chain: &Arc<MockChain>) -> TransactionManager {
        TransactionManager::new(chain.clone(), TxSettings::default())
    }

    async fn signed_transfer(manager: &TransactionManager, wallet: &Wallet) -> SignedTransaction {
        let nonce = manager.next_nonce(wallet.address()).await.unwrap();
        let request = TransactionRequest::default()
            .with_from(wallet.address())
            .with_to(address!("00000000000000000000000000000000000000aa"))
            .with_nonce(nonce)
            .with_chain_id(manager.settings().chain_id)
            .with_value(U256::ZERO)
            .with_gas_limit(21_000)
            .with_gas_price(manager.gas_station().gas_price());
        manager.sign(wallet, request).await.unwrap()
    }

    #[tokio::test]
    async fn nonces_start_from_chain_and_increment_locally() {
        let chain = Arc::new(MockChain::new());
        let a = address!("000000000000000000000000000000000000000a");
        let b = address!("000000000000000000000000000000000000000b");
        chain.set_nonce(a, 7);
        chain.set_nonce(b, 0);
        let manager = manager(&chain);

        let mut issued = Vec::new();
        for _ in 0..4 {
            issued.push(manager.next_nonce(a).await.unwrap());
        }
        assert_eq!(issued, [7, 8, 9, 10]);
        assert_eq!(manager.next_nonce(b).await.unwrap(), 0);
        assert_eq!(manager.next_nonce(b).await.unwrap(), 1);

        // cached counters are never re-read, even if the chain moves on
        chain.set_nonce(a, 100);
        assert_eq!(manager.next_nonce(a).await.unwrap(), 11);
        assert_eq!(chain.nonce_queries(), [a, b]);
    }

    #[tokio::test]
    async fn nonce_query_failure_propagates_without_caching() {
        let chain = Arc::new(MockChain::new());
        let a = address!("000000000000000000000000000000000000000a");
        chain.set_nonce(a, 3);
        chain.fail_nonce_queries(Some("connection refused"));
        let manager = manager(&chain);

        let err = manager.next_nonce(a).await.unwrap_err();
        assert!(matches!(err, AppError::Chain(_)));

        chain.fail_nonce_queries(None);
        assert_eq!(manager.next_nonce(a).await.unwrap(), 3);
        assert_eq!(chain.nonce_queries().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_nonce_requests_are_serialized() {
        let chain = Arc::new(MockChain::new());
        let a = address!("000000000000000000000000000000000000000a");
        chain.set_nonce(a, 5);
        let manager = Arc::new(manager(&chain));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.next_nonce(a).await.unwrap() })
            })
            .collect();
        let mut issued = Vec::new();
        for handle in handles {
            issued.push(handle.await.unwrap());
        }
        issued.sort_unstable();
        assert_eq!(issued, (5..13).collect::<Vec<_>>());
        assert_eq!(chain.nonce_queries().len(), 1);
    }

    #[tokio::test]
    async fn sign_produces_decodable_legacy_transaction() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        chain.set_nonce(wallet.address(), 42);

        let signed = signed_transfer(&manager, &wallet).await;
        assert_eq!(signed.nonce, 42);

        let outcome = manager.submit_with_retry(&signed, 3, &CancellationToken::new()).await;
        assert_eq!(outcome, TxOutcome::Confirmed(signed.hash));

        let sent = chain.broadcasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].nonce(), 42);
        assert_eq!(sent[0].raw, signed.raw);
        use alloy::consensus::Transaction;
        assert_eq!(sent[0].tx.gas_limit(), 21_000);
        assert_eq!(sent[0].tx.gas_price(), Some(10_000_000_000));
        assert_eq!(sent[0].tx.chain_id(), Some(233));
    }

    #[tokio::test]
    async fn sign_refuses_unpriced_requests() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        let request = TransactionRequest::default()
            .with_to(Address::ZERO)
            .with_nonce(0)
            .with_gas_limit(21_000);
        assert!(matches!(
            manager.sign(&wallet, request).await,
            Err(AppError::Signing(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_back_off_linearly() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        let signed = signed_transfer(&manager, &wallet).await;
        chain.plan_mined([Mined::Reverted; 4]);

        let start = tokio::time::Instant::now();
        let outcome = manager.submit_with_retry(&signed, 4, &CancellationToken::new()).await;

        assert!(matches!(outcome, TxOutcome::Failed(ref reason) if reason.contains("reverted")));
        let sent = chain.broadcasts();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|b| b.raw == signed.raw));
        let gaps: Vec<_> = sent.windows(2).map(|w| w[1].at - w[0].at).collect();
        assert_eq!(
            gaps,
            [
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(15)
            ]
        );
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_broadcasts_count_as_attempts() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        let signed = signed_transfer(&manager, &wallet).await;
        chain.fail_all_sends(Some("replacement transaction underpriced"));

        let outcome = manager.submit_with_retry(&signed, 3, &CancellationToken::new()).await;
        assert!(matches!(outcome, TxOutcome::Failed(ref r) if r.contains("underpriced")));
        assert_eq!(chain.send_attempts(), 3);
        assert!(chain.broadcasts().is_empty());
        assert_eq!(outcome.confirmed_hash(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        let signed = signed_transfer(&manager, &wallet).await;
        chain.fail_next_send("nonce too low");

        let outcome = manager.submit_with_retry(&signed, 3, &CancellationToken::new()).await;
        assert!(outcome.is_confirmed());
        assert_eq!(chain.send_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_receipt_times_out_as_pending() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        let signed = signed_transfer(&manager, &wallet).await;
        chain.plan_mined([Mined::Never]);

        let start = tokio::time::Instant::now();
        assert_eq!(
            manager.wait_for_receipt(signed.hash, &CancellationToken::new()).await,
            TxOutcome::Pending(signed.hash)
        );
        assert!(start.elapsed() >= Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_timeouts_are_retried_then_fail() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        let signed = signed_transfer(&manager, &wallet).await;
        chain.plan_mined([Mined::Never; 3]);

        let start = tokio::time::Instant::now();
        let outcome = manager
            .submit_with_retry(&signed, 3, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, TxOutcome::Failed(ref r) if r.contains("no receipt")));
        let sent = chain.broadcasts();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|b| b.raw == signed.raw));
        let gaps: Vec<_> = sent.windows(2).map(|w| w[1].at - w[0].at).collect();
        // receipt timeout, then the backoff
        assert_eq!(
            gaps,
            [Duration::from_secs(300 + 5), Duration::from_secs(300 + 10)]
        );
        assert_eq!(start.elapsed(), Duration::from_secs(3 * 300 + 5 + 10));
    }

    fn cancel_after(secs: u64) -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(secs)).await;
            trigger.cancel();
        });
        cancel
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_retry_backoff() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        let signed = signed_transfer(&manager, &wallet).await;
        chain.fail_next_send("nonce too low");
        let cancel = cancel_after(2);

        let start = tokio::time::Instant::now();
        let outcome = manager.submit_with_retry(&signed, 3, &cancel).await;

        assert!(matches!(outcome, TxOutcome::Failed(ref r) if r.contains("cancelled")));
        assert_eq!(chain.send_attempts(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_leaves_broadcast_pending() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        let signed = signed_transfer(&manager, &wallet).await;
        chain.plan_mined([Mined::Never]);
        let cancel = cancel_after(20);

        let start = tokio::time::Instant::now();
        let outcome = manager.submit_with_retry(&signed, 3, &cancel).await;

        assert_eq!(outcome, TxOutcome::Pending(signed.hash));
        assert_eq!(chain.send_attempts(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_sleeps() {
        let chain = Arc::new(MockChain::new());
        let manager = manager(&chain);
        let wallet = Wallet::from_signer(PrivateKeySigner::random());
        let signed = signed_transfer(&manager, &wallet).await;
        chain.fail_all_sends(Some("boom"));

        let start = tokio::time::Instant::now();
        let outcome = manager.submit_with_retry(&signed, 1, &CancellationToken::new()).await;
        assert!(matches!(outcome, TxOutcome::Failed(_)));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
