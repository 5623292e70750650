//! Vault module for the Securden bridge
//!
//! This module implements the request/response bridge between typed host
//! configuration and the Securden REST API.
//!
//! ## Architectural role:
//! - `params` assembles sparse parameter bags from host attributes
//! - `tls` decides how far the server certificate is trusted
//! - `request` turns a bag into a query string or JSON body
//! - `normalize` flattens loosely typed JSON responses into records
//! - `client` drives a single request through all of the above
//! - `accounts` exposes one function per server operation
//!
//! ## Testing strategy:
//! - Each module contains its own unit tests within a `#[cfg(test)] mod tests` block
//! - Integration tests in the `tests/` directory run the operations against a
//!   mock server

pub mod accounts;
pub mod client;
pub mod error;
pub mod normalize;
pub mod params;
pub mod request;
pub mod tls;

pub use accounts::Outcome;
pub use client::VaultClient;
pub use error::VaultError;
pub use params::{ConfigValue, ParamValue, ParameterBag};

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// Header carrying the API token on every request.
pub const AUTH_TOKEN_HEADER: &str = "authtoken";

/// Port used for the certificate probe when the URL does not name one.
pub const DEFAULT_TLS_PORT: u16 = 443;

/// Server API generation the bridge talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiVersion {
    /// Plugin version 1.0.0: fixed-field account reads, password lookups allowed.
    Legacy,
    /// Dynamic account reads with `key_field` selection.
    #[default]
    Current,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::Legacy => "1.0.0",
            ApiVersion::Current => "current",
        }
    }
}

impl FromStr for ApiVersion {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.0.0" | "legacy" => Ok(ApiVersion::Legacy),
            "" | "current" | "latest" => Ok(ApiVersion::Current),
            other => Err(VaultError::InvalidApiVersion(other.to_string())),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings shared by every operation.
///
/// Built once from the host configuration and passed by reference afterwards.
#[derive(Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Validated server URL, e.g. "https://company.securden.com:5959".
    server_url: String,
    /// API token sent verbatim in the `authtoken` header.
    auth_token: String,
    /// Absolute path to a PEM certificate. Empty means "fetch from the server".
    certificate: String,
    api_version: ApiVersion,
}

impl ConnectionConfig {
    /// Validates the server URL and, when given, the certificate file.
    pub fn new(
        server_url: &str,
        auth_token: &str,
        certificate: Option<&str>,
    ) -> Result<Self, VaultError> {
        validate_server_url(server_url)?;

        let certificate = certificate.map(str::trim).unwrap_or_default();
        let certificate = if certificate.eq_ignore_ascii_case("none") {
            ""
        } else {
            certificate
        };
        if !certificate.is_empty() && !is_valid_pem_file(Path::new(certificate)) {
            return Err(VaultError::InvalidCertificate(
                "The provided certificate is not valid or file not exists.".to_string(),
            ));
        }

        debug!(
            "Configured Securden connection to {} (certificate: {})",
            server_url,
            if certificate.is_empty() { "auto" } else { certificate }
        );

        Ok(Self {
            server_url: server_url.to_string(),
            auth_token: auth_token.to_string(),
            certificate: certificate.to_string(),
            api_version: ApiVersion::default(),
        })
    }

    /// Set API version
    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    /// Skips certificate validation. The trust resolver still falls back to an
    /// unverified transport if the file turns out to be unusable.
    pub fn with_unchecked_certificate(mut self, certificate: &str) -> Self {
        self.certificate = certificate.to_string();
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    pub fn is_https(&self) -> bool {
        self.server_url.starts_with("https")
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server_url", &self.server_url)
            .field("auth_token", &"<redacted>")
            .field("certificate", &self.certificate)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Checks that `input` is an absolute http(s) URL with an explicit port, a
/// plausible host and no trailing slash.
pub fn validate_server_url(input: &str) -> Result<Url, VaultError> {
    let invalid = |reason: &str| VaultError::InvalidUrl(format!("{}: {}", reason, input));

    let url = Url::parse(input).map_err(|_| invalid("not an absolute URL"))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(invalid("scheme must be http or https"));
    }

    // The url crate hides default ports and normalizes the path, so the raw
    // authority and path are inspected directly.
    let rest = input
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(|| invalid("not an absolute URL"))?;
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let path = tail.split(['?', '#']).next().unwrap_or_default();
    if path.ends_with('/') {
        return Err(invalid("path must not end with '/'"));
    }

    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let (host, port) = host_port
        .split_once(':')
        .ok_or_else(|| invalid("port is required"))?;
    if host.is_empty() || port.is_empty() {
        return Err(invalid("host and port are required"));
    }
    match port.parse::<u32>() {
        Ok(p) if (1..=65535).contains(&p) => {}
        _ => return Err(invalid("port must be between 1 and 65535")),
    }

    if !is_valid_hostname(host) {
        return Err(invalid("invalid host name"));
    }
    Ok(url)
}

/// Accepts `localhost`, dotted domains ending in an alphabetic TLD, or a
/// dotted IPv4 quad.
fn is_valid_hostname(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() == 4
        && labels
            .iter()
            .all(|l| (1..=3).contains(&l.len()) && l.bytes().all(|b| b.is_ascii_digit()))
    {
        return true;
    }

    let Some((tld, domain)) = labels.split_last() else {
        return false;
    };
    !domain.is_empty()
        && tld.len() >= 2
        && tld.bytes().all(|b| b.is_ascii_alphabetic())
        && domain.iter().all(|label| {
            !label.is_empty() && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

/// True when `path` names a readable file holding a PEM encoded X.509 certificate.
pub fn is_valid_pem_file(path: &Path) -> bool {
    if path.as_os_str().is_empty() || path.to_string_lossy().eq_ignore_ascii_case("none") {
        return false;
    }
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        _ => return false,
    }
    tls::read_pem_file(path).is_ok()
}
