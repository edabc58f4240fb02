//! Drip Server - funds-dispensing service in front of a wallet backend
//!
//! This crate implements a withdrawal faucet:
//! 1. At startup a funding wallet is brought into a known state: an
//!    operator-provided wallet is adopted, or a wallet is generated against
//!    the backend (waiting for node sync) and its recovery record persisted
//! 2. Withdrawal requests arrive over HTTP and are serialized through a
//!    bounded queue drained by a single background worker
//! 3. The worker submits each payment to the wallet backend over a
//!    mutually-authenticated transport and completes a per-request result
//!    channel with the outcome

pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod state;
pub mod transport;
pub mod wallet;
pub mod withdraw;

pub use backend::{HttpWalletBackend, WalletBackend};
pub use config::DripConfig;
pub use error::{ApiError, BackendError, InitError, SubmitError};
pub use state::FaucetState;
pub use wallet::FundingWallet;
pub use withdraw::{WithdrawalOutcome, WithdrawalRequest};
