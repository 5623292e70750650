//! Trust resolution for the server connection.
//!
//! Picks one of three transports per call:
//!
//! - plain HTTP when the server URL is not `https`
//! - a pinned transport trusting exactly one certificate, taken either from
//!   the configured PEM file or fetched from the server itself
//! - an unverified transport when no usable certificate is available
//!
//! A pinned transport that fails at the transport level is retried once
//! without verification by the client.

use crate::vault::{ConnectionConfig, VaultError, DEFAULT_TLS_PORT};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use reqwest::blocking::Client;
use std::fmt;
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Request timeout applied to pinned transports only.
pub const PINNED_TIMEOUT: Duration = Duration::from_secs(30);

/// Read/write timeout for the certificate probe connection.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// How the server certificate is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustMode {
    /// `http://` server, no TLS involved.
    Plain,
    /// Only the pinned certificate is trusted.
    Pinned,
    /// Certificate verification disabled.
    Insecure,
}

impl fmt::Display for TrustMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustMode::Plain => write!(f, "plain"),
            TrustMode::Pinned => write!(f, "pinned"),
            TrustMode::Insecure => write!(f, "insecure"),
        }
    }
}

/// HTTP client paired with the trust decision that produced it.
#[derive(Debug, Clone)]
pub struct Transport {
    mode: TrustMode,
    client: Client,
}

impl Transport {
    pub fn plain() -> Result<Self, VaultError> {
        let client = Client::builder()
            .timeout(None)
            .build()
            .map_err(|e| VaultError::Build(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            mode: TrustMode::Plain,
            client,
        })
    }

    pub fn insecure() -> Result<Self, VaultError> {
        debug!("Creating insecure HTTP client");
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .timeout(None)
            .build()
            .map_err(|e| VaultError::Build(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            mode: TrustMode::Insecure,
            client,
        })
    }

    /// Trusts `cert` and nothing else.
    pub fn pinned(cert: &X509) -> Result<Self, VaultError> {
        let pem = cert.to_pem()?;
        let certificate = reqwest::Certificate::from_pem(&pem)?;
        let client = Client::builder()
            .tls_built_in_root_certs(false)
            .add_root_certificate(certificate)
            .timeout(PINNED_TIMEOUT)
            .build()?;
        Ok(Self {
            mode: TrustMode::Pinned,
            client,
        })
    }

    pub fn mode(&self) -> TrustMode {
        self.mode
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Decides which transport to use for `config`.
pub fn resolve_transport(config: &ConnectionConfig) -> Result<Transport, VaultError> {
    if !config.is_https() {
        return Transport::plain();
    }

    let cert_ref = config.certificate();
    let cert = if cert_ref.is_empty() {
        match fetch_server_certificate(config.server_url()) {
            Ok(cert) => Some(cert),
            Err(e) => {
                info!("Could not fetch certificate from {}: {}", config.server_url(), e);
                None
            }
        }
    } else if Path::new(cert_ref).is_absolute() {
        match read_pem_file(Path::new(cert_ref)) {
            Ok(cert) => Some(cert),
            Err(e) => {
                warn!("Ignoring unusable certificate {}: {}", cert_ref, e);
                None
            }
        }
    } else {
        warn!("Certificate path {} is not absolute, skipping verification", cert_ref);
        None
    };

    match cert {
        Some(cert) => Transport::pinned(&cert).or_else(|e| {
            warn!("Failed to build pinned transport: {}", e);
            Transport::insecure()
        }),
        None => Transport::insecure(),
    }
}

/// Reads the first PEM block of `path` as an X.509 certificate.
pub fn read_pem_file(path: &Path) -> Result<X509, VaultError> {
    let pem = std::fs::read(path)?;
    X509::from_pem(&pem)
        .map_err(|e| VaultError::InvalidCertificate(format!("failed to parse certificate: {}", e)))
}

/// Retrieves the leaf certificate the server presents, without verifying it.
pub fn fetch_server_certificate(server_url: &str) -> Result<X509, VaultError> {
    let url = Url::parse(server_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| VaultError::InvalidUrl(format!("missing host: {}", server_url)))?;
    let port = url.port_or_known_default().unwrap_or(DEFAULT_TLS_PORT);

    let mut builder = SslConnector::builder(SslMethod::tls())?;
    builder.set_verify(SslVerifyMode::NONE);
    let connector = builder.build();

    let stream = TcpStream::connect((host, port))
        .map_err(|e| VaultError::Handshake(e.to_string()))?;
    stream.set_read_timeout(Some(PROBE_TIMEOUT))?;
    stream.set_write_timeout(Some(PROBE_TIMEOUT))?;

    let mut ssl_config = connector.configure()?;
    ssl_config.set_verify_hostname(false);
    let mut tls_stream = ssl_config
        .connect(host, stream)
        .map_err(|e| VaultError::Handshake(e.to_string()))?;

    let cert = tls_stream
        .ssl()
        .peer_certificate()
        .ok_or_else(|| VaultError::Handshake("no certificates found".to_string()))?;
    let _ = tls_stream.shutdown();

    debug!("Fetched server certificate from {}:{}", host, port);
    Ok(cert)
}
