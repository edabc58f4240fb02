//! Configuration management for the drip server.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripConfig {
    /// HTTP server configuration
    pub http: HttpConfig,

    /// Wallet backend connection configuration
    pub backend: BackendConfig,

    /// Funding wallet and withdrawal configuration
    pub wallet: WalletConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Port to bind to
    pub port: u16,

    /// Address to bind to
    pub bind_address: String,
}

/// Wallet backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend API endpoint (https)
    pub endpoint: String,

    /// Path to the PEM client certificate presented to the backend
    pub tls_cert_path: PathBuf,

    /// Path to the PEM client private key
    pub tls_key_path: PathBuf,
}

/// Funding wallet and withdrawal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Where the funding wallet comes from
    pub source: SourceWallet,

    /// Payout per withdrawal, in the smallest currency unit
    pub amount: i64,

    /// Withdrawal queue capacity; requests beyond it are rejected
    pub queue_capacity: usize,

    /// Delay between backend sync polls during wallet creation, in seconds
    pub sync_poll_secs: u64,

    /// Maximum number of sync polls before startup gives up
    pub sync_max_polls: u32,
}

/// Which initialization strategy runs at startup: generate a wallet and
/// persist its recovery record at `path`, or adopt a wallet described by an
/// operator-provided file at `path`. Exactly one, fixed for the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceWallet {
    Generate { path: PathBuf },
    Provided { path: PathBuf },
}

impl Default for DripConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                port: 4000,
                bind_address: "127.0.0.1".to_string(),
            },
            backend: BackendConfig {
                endpoint: "https://127.0.0.1:8090/".to_string(),
                tls_cert_path: PathBuf::from("tls/client.crt"),
                tls_key_path: PathBuf::from("tls/client.key"),
            },
            wallet: WalletConfig {
                source: SourceWallet::Generate {
                    path: PathBuf::from("wallet/generated-wallet.json"),
                },
                amount: 1_000_000,
                queue_capacity: 10,
                sync_poll_secs: 5,
                // 720 polls at 5s is an hour of backend catch-up.
                sync_max_polls: 720,
            },
        }
    }
}

impl DripConfig {
    /// Load configuration from a TOML file, with `DRIP_`-prefixed environment
    /// variable overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Toml))
            .add_source(config::Environment::with_prefix("DRIP"))
            .build()?;

        settings.try_deserialize()
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let endpoint = url::Url::parse(&self.backend.endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid backend endpoint: {}", e))?;
        if endpoint.scheme() != "https" {
            return Err(anyhow::anyhow!("Backend endpoint must use https"));
        }

        if self.wallet.amount <= 0 {
            return Err(anyhow::anyhow!("Withdrawal amount must be positive"));
        }

        if self.wallet.queue_capacity == 0 {
            return Err(anyhow::anyhow!("Queue capacity must be at least 1"));
        }

        if self.wallet.sync_poll_secs == 0 {
            return Err(anyhow::anyhow!("Sync poll interval must be at least 1s"));
        }

        if self.wallet.sync_max_polls == 0 {
            return Err(anyhow::anyhow!("Sync poll limit must be at least 1"));
        }

        Ok(())
    }
}
