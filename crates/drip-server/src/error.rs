//! Error handling for the drip server.

use crate::backend::WalletId;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the wallet backend client.
///
/// Raw transport errors never cross the backend trait boundary; they are
/// flattened into one of these variants with a readable message.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend transport error: {0}")]
    Transport(String),

    #[error("backend rejected request: {0}")]
    Api(String),

    #[error("unexpected backend response: {0}")]
    UnexpectedResponse(String),
}

/// Startup initialization errors. All of these are fatal: the server must not
/// accept withdrawal requests with a partially initialized funding wallet.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("failed to parse source wallet file {}: {reason}", .path.display())]
    SourceWalletParse { path: PathBuf, reason: String },

    #[error("could not read backend sync state: {0}")]
    CouldntReadSyncState(BackendError),

    #[error("wallet creation failed: {0}")]
    WalletCreation(BackendError),

    #[error("could not read balance of wallet {wallet}: {reason}")]
    CouldntReadBalance { wallet: WalletId, reason: String },

    #[error("wallet {wallet} reported {count} accounts, expected exactly one")]
    NoWalletAccounts { wallet: WalletId, count: usize },

    #[error("wallet {wallet} account {account} reported {count} addresses, expected exactly one")]
    BadAddress {
        wallet: WalletId,
        account: u32,
        count: usize,
    },

    #[error("failed to read generated wallet record {}: {reason}", .path.display())]
    CreatedWalletRead { path: PathBuf, reason: String },

    #[error("backend did not reach full sync after {polls} polls")]
    SyncTimeout { polls: u32 },

    #[error("failed to persist generated wallet record {}: {reason}", .path.display())]
    PersistWallet { path: PathBuf, reason: String },

    #[error("failed to build backend transport: {0}")]
    Transport(String),
}

/// Rejections from the non-blocking enqueue operation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// The queue is at capacity. Transient; the caller may retry later.
    #[error("withdrawal queue is full")]
    QueueFull,

    /// The worker has stopped and the queue can never drain.
    #[error("withdrawal worker is not running")]
    WorkerGone,
}

/// Errors surfaced to API callers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid destination address: {0}")]
    InvalidAddress(String),

    #[error("service unavailable, retry later")]
    Unavailable,

    #[error("withdrawal failed: {0}")]
    WithdrawalFailed(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            ApiError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::WithdrawalFailed(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
