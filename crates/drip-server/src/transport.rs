//! Mutually-authenticated transport to the wallet backend.
//!
//! The backend is a single operator-controlled peer (typically on localhost),
//! so the client presents a certificate/key pair and skips chain validation of
//! the peer instead of carrying a CA bundle. Building the client opens no
//! connection; it only produces a reusable connection manager.

use crate::error::InitError;
use std::fs;
use std::path::Path;
use tracing::info;

/// Build the mTLS client from a PEM certificate and private key on disk.
///
/// Any read or decode failure is startup-fatal: the server must not come up
/// without a working credential.
pub fn build_client(cert_path: &Path, key_path: &Path) -> Result<reqwest::Client, InitError> {
    let cert = fs::read(cert_path).map_err(|e| {
        InitError::Transport(format!(
            "failed to read client certificate {}: {e}",
            cert_path.display()
        ))
    })?;
    let key = fs::read(key_path).map_err(|e| {
        InitError::Transport(format!(
            "failed to read client key {}: {e}",
            key_path.display()
        ))
    })?;

    // reqwest expects certificate and key concatenated in one PEM bundle.
    let mut pem = cert;
    pem.extend_from_slice(&key);
    let identity = reqwest::Identity::from_pem(&pem)
        .map_err(|e| InitError::Transport(format!("failed to decode client credential: {e}")))?;

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .identity(identity)
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .https_only(true)
        // Single trusted peer, operator-controlled; no chain validation.
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| InitError::Transport(format!("failed to build backend client: {e}")))?;

    info!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        "backend transport ready"
    );
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_certificate_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("missing.crt");
        let key = dir.path().join("missing.key");

        let err = build_client(&cert, &key).unwrap_err();
        assert!(matches!(err, InitError::Transport(_)));
        assert!(err.to_string().contains("client certificate"));
    }

    #[test]
    fn test_garbage_credential_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("client.crt");
        let key = dir.path().join("client.key");
        fs::write(&cert, b"not a certificate").unwrap();
        fs::write(&key, b"not a key").unwrap();

        let err = build_client(&cert, &key).unwrap_err();
        assert!(matches!(err, InitError::Transport(_)));
    }
}
