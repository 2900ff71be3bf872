//! TLS material for the inbound listener.
//!
//! Certificate chain and private key are read from PEM files once at
//! startup. A missing file is reported by name before rustls is involved.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

fn require_file(kind: &str, path: &Path) -> io::Result<()> {
    match path.metadata() {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{kind} path is not a file: {}", path.display()),
        )),
        Err(e) => Err(io::Error::new(
            e.kind(),
            format!("{kind} file {}: {e}", path.display()),
        )),
    }
}

/// Build the listener's rustls configuration.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> io::Result<RustlsConfig> {
    // reqwest and axum-server can enable different rustls backends; rustls
    // then refuses to pick one implicitly. Err means one is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    require_file("certificate", cert_path)?;
    require_file("private key", key_path)?;

    let config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::info!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        "TLS material loaded"
    );
    Ok(config)
}
