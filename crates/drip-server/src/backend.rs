//! Wallet backend client.
//!
//! The backend is reached over the mutually-authenticated client built by
//! [`crate::transport`] and exposes node sync state, wallet creation, account
//! and address listing, balance queries and payment submission. The capability
//! set is a trait so tests can substitute a deterministic stub with scripted
//! sync sequences, account counts and payment outcomes.

use crate::error::BackendError;
use crate::wallet::WalletHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use url::Url;

/// Backend-assigned wallet identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(pub String);

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payment accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Backend-assigned transaction identifier.
    pub id: String,
    /// Amount moved, in the smallest currency unit.
    pub amount: i64,
}

/// The operations this service needs from the wallet backend.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Node sync state as a percentage; 100.0 means fully caught up.
    async fn sync_progress(&self) -> Result<f64, BackendError>;

    /// Create a wallet from a recovery phrase and return its identifier.
    async fn create_wallet(&self, recovery_words: &[String]) -> Result<WalletId, BackendError>;

    /// List the account indexes of a wallet.
    async fn list_accounts(&self, wallet: &WalletId) -> Result<Vec<u32>, BackendError>;

    /// List the receiving addresses of an account.
    async fn list_addresses(
        &self,
        wallet: &WalletId,
        account: u32,
    ) -> Result<Vec<String>, BackendError>;

    /// Available balance of a wallet, in the smallest currency unit.
    async fn balance(&self, wallet: &WalletId) -> Result<i64, BackendError>;

    /// Submit a payment from the funding wallet to a destination address.
    async fn submit_payment(
        &self,
        source: &WalletHandle,
        address: &str,
        amount: i64,
    ) -> Result<Transaction, BackendError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct NetworkInfo {
    sync_progress: ProgressQuantity,
}

#[derive(Deserialize)]
struct ProgressQuantity {
    quantity: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct CreateWalletBody<'a> {
    name: &'a str,
    recovery_words: &'a [String],
}

#[derive(Deserialize)]
struct CreatedWallet {
    id: WalletId,
}

#[derive(Deserialize)]
struct WalletInfo {
    balance: BalanceInfo,
}

#[derive(Deserialize)]
struct BalanceInfo {
    available: BalanceQuantity,
}

#[derive(Deserialize)]
struct BalanceQuantity {
    quantity: i64,
}

#[derive(Deserialize)]
struct AccountInfo {
    index: u32,
}

#[derive(Deserialize)]
struct AddressInfo {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct PaymentBody<'a> {
    account_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    spending_password: Option<&'a str>,
    payments: Vec<Payment<'a>>,
}

#[derive(Serialize)]
struct Payment<'a> {
    address: &'a str,
    amount: i64,
}

/// [`WalletBackend`] implementation over the backend's HTTP API.
pub struct HttpWalletBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpWalletBackend {
    /// Bind a backend client to an already-built transport and endpoint.
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self {
            client,
            base: endpoint,
        }
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|e| BackendError::Transport(format!("invalid backend url {path}: {e}")))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(BackendError::Api(format!("{status}: {body}")))
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.url(path)?;
        debug!(%url, "backend GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::UnexpectedResponse(e.to_string()))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let url = self.url(path)?;
        debug!(%url, "backend POST");
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::UnexpectedResponse(e.to_string()))
    }
}

impl fmt::Debug for HttpWalletBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpWalletBackend")
            .field("base", &self.base.as_str())
            .finish()
    }
}

#[async_trait]
impl WalletBackend for HttpWalletBackend {
    async fn sync_progress(&self) -> Result<f64, BackendError> {
        let info: NetworkInfo = self.get_json("v2/network/information").await?;
        Ok(info.sync_progress.quantity)
    }

    async fn create_wallet(&self, recovery_words: &[String]) -> Result<WalletId, BackendError> {
        let body = CreateWalletBody {
            name: "drip-funding",
            recovery_words,
        };
        let created: CreatedWallet = self.post_json("v2/wallets", &body).await?;
        Ok(created.id)
    }

    async fn list_accounts(&self, wallet: &WalletId) -> Result<Vec<u32>, BackendError> {
        let accounts: Vec<AccountInfo> = self.get_json(&format!("v2/wallets/{wallet}/accounts")).await?;
        Ok(accounts.into_iter().map(|a| a.index).collect())
    }

    async fn list_addresses(
        &self,
        wallet: &WalletId,
        account: u32,
    ) -> Result<Vec<String>, BackendError> {
        let addresses: Vec<AddressInfo> = self
            .get_json(&format!("v2/wallets/{wallet}/accounts/{account}/addresses"))
            .await?;
        Ok(addresses.into_iter().map(|a| a.id).collect())
    }

    async fn balance(&self, wallet: &WalletId) -> Result<i64, BackendError> {
        let info: WalletInfo = self.get_json(&format!("v2/wallets/{wallet}")).await?;
        Ok(info.balance.available.quantity)
    }

    async fn submit_payment(
        &self,
        source: &WalletHandle,
        address: &str,
        amount: i64,
    ) -> Result<Transaction, BackendError> {
        let body = PaymentBody {
            account_index: source.account_index,
            spending_password: source.spending_password.as_deref(),
            payments: vec![Payment { address, amount }],
        };
        self.post_json(
            &format!("v2/wallets/{}/transactions", source.wallet_id),
            &body,
        )
        .await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable in-memory backend used by module tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct StubBackend {
        pub sync_sequence: Mutex<VecDeque<f64>>,
        pub fail_sync: Option<String>,
        pub accounts: Vec<u32>,
        pub addresses: Vec<String>,
        pub balance: i64,
        pub fail_address: Option<String>,
        pub sync_calls: AtomicUsize,
        pub create_calls: AtomicUsize,
        pub account_calls: AtomicUsize,
        pub address_calls: AtomicUsize,
        pub balance_calls: AtomicUsize,
        pub payments: Mutex<Vec<(String, i64)>>,
    }

    impl StubBackend {
        /// A fully synced backend with one account, one address.
        pub fn synced() -> Self {
            Self {
                sync_sequence: Mutex::new(VecDeque::new()),
                fail_sync: None,
                accounts: vec![0],
                addresses: vec!["addr-stub-0".to_string()],
                balance: 0,
                fail_address: None,
                sync_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
                account_calls: AtomicUsize::new(0),
                address_calls: AtomicUsize::new(0),
                balance_calls: AtomicUsize::new(0),
                payments: Mutex::new(Vec::new()),
            }
        }

        pub fn with_sync_sequence(mut self, seq: Vec<f64>) -> Self {
            self.sync_sequence = Mutex::new(seq.into());
            self
        }

        pub fn with_accounts(mut self, accounts: Vec<u32>) -> Self {
            self.accounts = accounts;
            self
        }

        pub fn with_addresses(mut self, addresses: Vec<String>) -> Self {
            self.addresses = addresses;
            self
        }

        pub fn with_balance(mut self, balance: i64) -> Self {
            self.balance = balance;
            self
        }

        /// Payments to this address fail; everything else succeeds.
        pub fn failing_address(mut self, address: &str) -> Self {
            self.fail_address = Some(address.to_string());
            self
        }

        pub fn total_calls(&self) -> usize {
            self.sync_calls.load(Ordering::SeqCst)
                + self.create_calls.load(Ordering::SeqCst)
                + self.account_calls.load(Ordering::SeqCst)
                + self.address_calls.load(Ordering::SeqCst)
                + self.balance_calls.load(Ordering::SeqCst)
                + self.payments.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl WalletBackend for StubBackend {
        async fn sync_progress(&self) -> Result<f64, BackendError> {
            self.sync_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = &self.fail_sync {
                return Err(BackendError::Transport(msg.clone()));
            }
            let next = self.sync_sequence.lock().unwrap().pop_front();
            Ok(next.unwrap_or(100.0))
        }

        async fn create_wallet(&self, recovery_words: &[String]) -> Result<WalletId, BackendError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(recovery_words.len(), 12);
            Ok(WalletId("wallet-stub-1".to_string()))
        }

        async fn list_accounts(&self, _wallet: &WalletId) -> Result<Vec<u32>, BackendError> {
            self.account_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.accounts.clone())
        }

        async fn list_addresses(
            &self,
            _wallet: &WalletId,
            _account: u32,
        ) -> Result<Vec<String>, BackendError> {
            self.address_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.addresses.clone())
        }

        async fn balance(&self, _wallet: &WalletId) -> Result<i64, BackendError> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.balance)
        }

        async fn submit_payment(
            &self,
            _source: &WalletHandle,
            address: &str,
            amount: i64,
        ) -> Result<Transaction, BackendError> {
            if self.fail_address.as_deref() == Some(address) {
                return Err(BackendError::Api(format!("destination {address} rejected")));
            }
            let mut payments = self.payments.lock().unwrap();
            payments.push((address.to_string(), amount));
            Ok(Transaction {
                id: format!("tx-stub-{}", payments.len()),
                amount,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_body_uses_kebab_case() {
        let body = PaymentBody {
            account_index: 3,
            spending_password: Some("hunter2"),
            payments: vec![Payment {
                address: "addr-1",
                amount: 1_000_000,
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["account-index"], 3);
        assert_eq!(json["spending-password"], "hunter2");
        assert_eq!(json["payments"][0]["address"], "addr-1");
        assert_eq!(json["payments"][0]["amount"], 1_000_000);
    }

    #[test]
    fn test_payment_body_omits_absent_password() {
        let body = PaymentBody {
            account_index: 0,
            spending_password: None,
            payments: vec![],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("spending-password").is_none());
    }

    #[test]
    fn test_network_info_parsing() {
        let info: NetworkInfo =
            serde_json::from_str(r#"{"sync-progress":{"quantity":98.75}}"#).unwrap();
        assert_eq!(info.sync_progress.quantity, 98.75);
    }

    #[test]
    fn test_wallet_info_parsing() {
        let info: WalletInfo =
            serde_json::from_str(r#"{"balance":{"available":{"quantity":1234}}}"#).unwrap();
        assert_eq!(info.balance.available.quantity, 1234);
    }
}
