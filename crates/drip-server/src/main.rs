//! Main entry point for the drip server.

use anyhow::Result;
use clap::{Arg, Command};
use drip_server::{
    backend::HttpWalletBackend, config::DripConfig, http::start_server, state::FaucetState,
    transport,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Parse command line arguments
    let matches = Command::new("drip-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drip Server - dispense funds from a backend wallet over HTTP")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file")
                .default_value("drip-config.toml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a default configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .expect("config has a default value");

    // Handle config generation
    if matches.get_flag("generate-config") {
        return generate_config(config_path);
    }

    info!("Starting Drip Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration from: {}", config_path);

    // Load configuration
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Use --generate-config to create a default configuration file");
            std::process::exit(1);
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!("Configuration loaded and validated successfully");
    info!(
        "Server will bind to: {}:{}",
        config.http.bind_address, config.http.port
    );
    info!("Wallet backend: {}", config.backend.endpoint);

    // Build the mutually-authenticated transport and the backend client.
    // Credential problems are startup-fatal.
    let client = match transport::build_client(
        &config.backend.tls_cert_path,
        &config.backend.tls_key_path,
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Transport setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let endpoint = url::Url::parse(&config.backend.endpoint)
        .map_err(|e| anyhow::anyhow!("Invalid backend endpoint: {}", e))?;
    let backend = Arc::new(HttpWalletBackend::new(client, endpoint));

    // Bring up the funding wallet and the withdrawal worker. The server must
    // not accept requests without a funding source.
    let state = match FaucetState::initialize(&config, backend).await {
        Ok(state) => state,
        Err(e) => {
            error!("Wallet initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    // Start the server
    if let Err(e) = start_server(&config, state).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Load configuration from file
fn load_config(path: &str) -> Result<DripConfig> {
    if !Path::new(path).exists() {
        return Err(anyhow::anyhow!(
            "Configuration file '{}' not found. Use --generate-config to create one.",
            path
        ));
    }

    DripConfig::from_file(path).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
}

/// Generate a default configuration file
fn generate_config(path: &str) -> Result<()> {
    let config = DripConfig::default();

    config.save_to_file(path)?;

    println!("Generated default configuration file: {}", path);
    println!();
    println!("IMPORTANT: Please edit the configuration file before running the server:");
    println!("1. Point backend.endpoint at your wallet backend");
    println!("2. Set the client TLS credential paths (backend.tls_cert_path / tls_key_path)");
    println!("3. Choose the funding wallet source (wallet.source)");
    println!("4. Set the payout per withdrawal (wallet.amount)");
    println!();
    println!("Example usage after configuration:");
    println!("  cargo run --bin drip-server -- --config {}", path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_generate_and_load_config() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        let temp_path = temp_file.path().to_str().unwrap();

        // Generate config
        generate_config(temp_path)?;

        // Should be able to load it
        let config = load_config(temp_path)?;

        // Should have default values
        assert_eq!(config.http.port, 4000);
        assert_eq!(config.wallet.queue_capacity, 10);

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = load_config("nonexistent-file.toml");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }
}
