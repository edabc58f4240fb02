//! Withdrawal queue and worker.
//!
//! Request handlers fan in to a bounded queue; a single background worker
//! drains it and submits payments to the backend one at a time, so payments
//! against the funding wallet are never issued concurrently. Each request
//! carries a one-shot result channel completed exactly once, success or
//! failure, and a failed payment never stops the worker.

use crate::backend::{Transaction, WalletBackend};
use crate::error::SubmitError;
use crate::state::FaucetMetrics;
use crate::wallet::WalletHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A withdrawal to a destination address. The amount is the server-wide
/// configured payout, not chosen by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub address: String,
}

/// Terminal outcome of a single withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalOutcome {
    Success(Transaction),
    Failure(String),
}

/// A request paired with its single-use result channel.
#[derive(Debug)]
pub struct PendingWithdrawal {
    request: WithdrawalRequest,
    result: oneshot::Sender<WithdrawalOutcome>,
}

/// Awaited by the submitting caller for the eventual outcome.
pub type ResultHandle = oneshot::Receiver<WithdrawalOutcome>;

/// Enqueue side of the withdrawal queue. Capacity is fixed at construction.
#[derive(Debug, Clone)]
pub struct WithdrawalQueue {
    tx: mpsc::Sender<PendingWithdrawal>,
    capacity: usize,
}

impl WithdrawalQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PendingWithdrawal>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, capacity }, rx)
    }

    /// Non-blocking enqueue. A full queue is rejected immediately rather than
    /// blocking the caller or silently dropping the request.
    pub fn submit(&self, request: WithdrawalRequest) -> Result<ResultHandle, SubmitError> {
        let (result_tx, result_rx) = oneshot::channel();
        let pending = PendingWithdrawal {
            request,
            result: result_tx,
        };
        match self.tx.try_send(pending) {
            Ok(()) => Ok(result_rx),
            Err(TrySendError::Full(_)) => Err(SubmitError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(SubmitError::WorkerGone),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Drain the queue for the lifetime of the process.
///
/// Exactly one instance of this loop runs per server. Per-request failures
/// are reported on that request's channel only; the loop itself only exits
/// when every enqueue handle has been dropped.
pub async fn run_worker(
    mut rx: mpsc::Receiver<PendingWithdrawal>,
    backend: Arc<dyn WalletBackend>,
    source: WalletHandle,
    amount: i64,
    metrics: Arc<FaucetMetrics>,
) {
    while let Some(PendingWithdrawal { request, result }) = rx.recv().await {
        let outcome = match backend
            .submit_payment(&source, &request.address, amount)
            .await
        {
            Ok(tx) => {
                metrics.record_withdrawal(tx.amount);
                info!(
                    address = %request.address,
                    tx = %tx.id,
                    amount = tx.amount,
                    "withdrawal submitted"
                );
                WithdrawalOutcome::Success(tx)
            }
            Err(e) => {
                warn!(address = %request.address, error = %e, "withdrawal failed");
                WithdrawalOutcome::Failure(e.to_string())
            }
        };
        // The caller may have gone away; the outcome is dropped in that case.
        let _ = result.send(outcome);
    }
    debug!("withdrawal queue closed, worker exiting");
}
