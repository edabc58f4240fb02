//! Shared server state.
//!
//! One [`FaucetState`] is assembled at startup and handed to every request
//! handler as an `Arc`; nothing here is global. Assembly is all-or-nothing:
//! if the funding wallet cannot be initialized the server must not come up.

use crate::backend::WalletBackend;
use crate::config::DripConfig;
use crate::error::InitError;
use crate::wallet::{initialize_wallet, FundingWallet};
use crate::withdraw::{run_worker, WithdrawalQueue};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Withdrawal counters and the wallet balance gauge. Updated by the worker on
/// each completed withdrawal; the gauge is set once at initialization.
#[derive(Debug, Default)]
pub struct FaucetMetrics {
    total_withdrawn: AtomicI64,
    withdrawal_count: AtomicU64,
    wallet_balance: AtomicI64,
}

impl FaucetMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_withdrawal(&self, amount: i64) {
        self.total_withdrawn.fetch_add(amount, Ordering::Relaxed);
        self.withdrawal_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_wallet_balance(&self, balance: i64) {
        self.wallet_balance.store(balance, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_withdrawn: self.total_withdrawn.load(Ordering::Relaxed),
            withdrawal_count: self.withdrawal_count.load(Ordering::Relaxed),
            wallet_balance: self.wallet_balance.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters, as reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_withdrawn: i64,
    pub withdrawal_count: u64,
    pub wallet_balance: i64,
}

/// Process-wide state: the funding wallet, the backend client, the withdrawal
/// queue and the counters. Read-mostly after construction.
pub struct FaucetState {
    pub wallet: FundingWallet,
    pub backend: Arc<dyn WalletBackend>,
    pub queue: WithdrawalQueue,
    pub metrics: Arc<FaucetMetrics>,
}

impl FaucetState {
    /// Initialize the funding wallet, set the balance gauge, build the queue
    /// and start the single withdrawal worker. Any failure is startup-fatal.
    pub async fn initialize(
        config: &DripConfig,
        backend: Arc<dyn WalletBackend>,
    ) -> Result<Arc<Self>, InitError> {
        let wallet = initialize_wallet(&config.wallet, backend.as_ref()).await?;

        let metrics = Arc::new(FaucetMetrics::new());
        metrics.set_wallet_balance(wallet.balance);

        let (queue, rx) = WithdrawalQueue::new(config.wallet.queue_capacity);
        tokio::spawn(run_worker(
            rx,
            backend.clone(),
            wallet.handle.clone(),
            config.wallet.amount,
            metrics.clone(),
        ));

        info!(
            wallet = %wallet.handle.wallet_id,
            balance = wallet.balance,
            capacity = config.wallet.queue_capacity,
            amount = config.wallet.amount,
            "faucet environment ready"
        );

        Ok(Arc::new(Self {
            wallet,
            backend,
            queue,
            metrics,
        }))
    }
}

impl fmt::Debug for FaucetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaucetState")
            .field("wallet", &self.wallet)
            .field("queue_capacity", &self.queue.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::StubBackend;
    use crate::config::SourceWallet;
    use crate::withdraw::{WithdrawalOutcome, WithdrawalRequest};
    use std::fs;

    fn config_with_source(source: SourceWallet) -> DripConfig {
        let mut config = DripConfig::default();
        config.wallet.source = source;
        config.wallet.amount = 250;
        config.wallet.queue_capacity = 4;
        config
    }

    #[tokio::test]
    async fn test_initialize_sets_gauge_and_serves_withdrawals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funding.json");
        fs::write(&path, r#"{"wallet-id":"wallet-s","account-index":0}"#).unwrap();

        let backend = Arc::new(StubBackend::synced().with_balance(9_000));
        let config = config_with_source(SourceWallet::Provided { path });

        let state = FaucetState::initialize(&config, backend).await.unwrap();
        assert_eq!(state.metrics.snapshot().wallet_balance, 9_000);
        assert_eq!(state.queue.capacity(), 4);

        let handle = state
            .queue
            .submit(WithdrawalRequest {
                address: "addr-dest".to_string(),
            })
            .unwrap();
        match handle.await.unwrap() {
            WithdrawalOutcome::Success(tx) => assert_eq!(tx.amount, 250),
            other => panic!("expected success, got {other:?}"),
        }

        let snapshot = state.metrics.snapshot();
        assert_eq!(snapshot.withdrawal_count, 1);
        assert_eq!(snapshot.total_withdrawn, 250);
    }

    #[tokio::test]
    async fn test_initialize_aborts_on_wallet_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated.json");
        fs::write(&path, b"corrupt record").unwrap();

        let backend = Arc::new(StubBackend::synced());
        let config = config_with_source(SourceWallet::Generate { path });

        let err = FaucetState::initialize(&config, backend).await.unwrap_err();
        assert!(matches!(err, InitError::CreatedWalletRead { .. }));
    }
}
