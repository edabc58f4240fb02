//! Funding wallet initialization.
//!
//! At startup the server brings exactly one funding wallet into a known state:
//! either an operator-provided wallet is adopted and its balance queried, or a
//! wallet is generated against the backend and its recovery material persisted
//! to disk. A record on disk is never regenerated silently; if it exists but
//! cannot be parsed, startup aborts rather than orphaning recovery material.

use crate::backend::{WalletBackend, WalletId};
use crate::config::{SourceWallet, WalletConfig};
use crate::error::InitError;
use bip39::Mnemonic;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// An existing backend wallet the server can spend from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WalletHandle {
    pub wallet_id: WalletId,
    pub account_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spending_password: Option<String>,
}

/// The initialized funding wallet. The balance is only refreshed here at
/// initialization; afterwards it is tracked by the balance gauge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingWallet {
    pub handle: WalletHandle,
    pub balance: i64,
}

/// Durable record of a wallet generation event. This is the only copy of the
/// recovery phrase, so it is written before the wallet is ever used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeneratedWallet {
    pub wallet_id: WalletId,
    pub recovery_words: Vec<String>,
    pub account_index: u32,
    pub address: String,
}

impl GeneratedWallet {
    pub fn handle(&self) -> WalletHandle {
        WalletHandle {
            wallet_id: self.wallet_id.clone(),
            account_index: self.account_index,
            spending_password: None,
        }
    }
}

/// Produce the funding wallet according to the configured source selector.
pub async fn initialize_wallet(
    cfg: &WalletConfig,
    backend: &dyn WalletBackend,
) -> Result<FundingWallet, InitError> {
    match &cfg.source {
        SourceWallet::Provided { path } => {
            let bytes = fs::read(path).map_err(|e| InitError::SourceWalletParse {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let handle: WalletHandle =
                serde_json::from_slice(&bytes).map_err(|e| InitError::SourceWalletParse {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            let balance = backend.balance(&handle.wallet_id).await.map_err(|e| {
                InitError::CouldntReadBalance {
                    wallet: handle.wallet_id.clone(),
                    reason: e.to_string(),
                }
            })?;
            info!(wallet = %handle.wallet_id, balance, "adopted provided funding wallet");
            Ok(FundingWallet { handle, balance })
        }
        SourceWallet::Generate { path } => match fs::read(path) {
            Ok(bytes) => {
                let record: GeneratedWallet =
                    serde_json::from_slice(&bytes).map_err(|e| InitError::CreatedWalletRead {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                info!(wallet = %record.wallet_id, "reusing previously generated funding wallet");
                Ok(FundingWallet {
                    handle: record.handle(),
                    balance: 0,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let record = create_wallet(cfg, backend).await?;
                // Persist before use so a crash here is recoverable on
                // restart without creating a second funds-bearing wallet.
                persist_record(path, &record)?;
                info!(
                    wallet = %record.wallet_id,
                    record = %path.display(),
                    "generated funding wallet and persisted recovery record"
                );
                Ok(FundingWallet {
                    handle: record.handle(),
                    balance: 0,
                })
            }
            Err(e) => Err(InitError::CreatedWalletRead {
                path: path.clone(),
                reason: e.to_string(),
            }),
        },
    }
}

/// Create a fresh wallet against the backend.
///
/// Waits for the backend to report full sync first, then creates a wallet from
/// a fresh 12-word recovery phrase. The backend is expected to return exactly
/// one account with exactly one address for a new wallet; any other count is a
/// contract violation and aborts startup rather than being papered over.
pub async fn create_wallet(
    cfg: &WalletConfig,
    backend: &dyn WalletBackend,
) -> Result<GeneratedWallet, InitError> {
    wait_for_sync(cfg, backend).await?;

    let recovery_words = generate_recovery_words();
    let wallet_id = backend
        .create_wallet(&recovery_words)
        .await
        .map_err(InitError::WalletCreation)?;

    let accounts = backend
        .list_accounts(&wallet_id)
        .await
        .map_err(InitError::WalletCreation)?;
    let account_index = match accounts.as_slice() {
        [index] => *index,
        _ => {
            return Err(InitError::NoWalletAccounts {
                wallet: wallet_id,
                count: accounts.len(),
            })
        }
    };

    let addresses = backend
        .list_addresses(&wallet_id, account_index)
        .await
        .map_err(InitError::WalletCreation)?;
    let address = match addresses.as_slice() {
        [address] => address.clone(),
        _ => {
            return Err(InitError::BadAddress {
                wallet: wallet_id,
                account: account_index,
                count: addresses.len(),
            })
        }
    };

    Ok(GeneratedWallet {
        wallet_id,
        recovery_words,
        account_index,
        address,
    })
}

/// Poll sync state until the backend reports 100%, bounded by
/// `sync_max_polls`. A failed query aborts immediately; only a
/// still-syncing backend is waited out.
async fn wait_for_sync(cfg: &WalletConfig, backend: &dyn WalletBackend) -> Result<(), InitError> {
    let delay = Duration::from_secs(cfg.sync_poll_secs);
    for poll in 1..=cfg.sync_max_polls {
        let progress = backend
            .sync_progress()
            .await
            .map_err(InitError::CouldntReadSyncState)?;
        if progress >= 100.0 {
            debug!(progress, poll, "backend fully synced");
            return Ok(());
        }
        info!(progress, poll, "backend still syncing, waiting");
        sleep(delay).await;
    }
    Err(InitError::SyncTimeout {
        polls: cfg.sync_max_polls,
    })
}

/// A fresh 12-word recovery phrase from OS entropy.
fn generate_recovery_words() -> Vec<String> {
    let mut entropy = [0u8; 16];
    OsRng.fill_bytes(&mut entropy);
    let mnemonic =
        Mnemonic::from_entropy(&entropy).expect("128 bits of entropy is a valid mnemonic size");
    mnemonic
        .to_string()
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

fn persist_record(path: &Path, record: &GeneratedWallet) -> Result<(), InitError> {
    let persist_err = |e: &dyn std::fmt::Display| InitError::PersistWallet {
        path: path.to_owned(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| persist_err(&e))?;
    }
    let json = serde_json::to_vec_pretty(record).map_err(|e| persist_err(&e))?;
    fs::write(path, json).map_err(|e| persist_err(&e))
}
