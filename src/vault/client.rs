//! Client implementation for Securden API interactions.
//!
//! This module drives a single request: build it, resolve a transport, send
//! it, and hand the raw body back. Status handling is left to the callers in
//! `accounts`, since each endpoint reports success differently.

use crate::vault::request::{build_request, HttpMethod, WireRequest};
use crate::vault::tls::{resolve_transport, Transport, TrustMode};
use crate::vault::{ConnectionConfig, ParameterBag, VaultError};
use tracing::{debug, info, warn};

/// Client for interacting with the Securden HTTP API.
#[derive(Debug, Clone)]
pub struct VaultClient {
    config: ConnectionConfig,
}

impl VaultClient {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Sends `params` to `path` and returns the raw response body.
    ///
    /// A transport-level failure on a pinned transport is retried once with
    /// certificate verification disabled.
    pub fn raise_request(
        &self,
        params: &ParameterBag,
        path: &str,
        method: HttpMethod,
    ) -> Result<Vec<u8>, VaultError> {
        // Values may hold passwords; only the keys are logged.
        debug!(
            "{} {} with parameters [{}]",
            method,
            path,
            params.keys().collect::<Vec<_>>().join(", ")
        );

        let request = build_request(&self.config, params, path, method)?;
        let transport = resolve_transport(&self.config)?;
        debug!("Using {} transport for {}", transport.mode(), path);

        match send(&transport, &request) {
            Err(VaultError::Request(reason)) if transport.mode() == TrustMode::Pinned => {
                warn!(
                    "Request to {} failed with pinned certificate, retrying without verification: {}",
                    path, reason
                );
                let fallback = Transport::insecure()?;
                match send(&fallback, &request) {
                    Err(VaultError::Request(reason)) => Err(VaultError::InsecureRetry(reason)),
                    other => other,
                }
            }
            other => other,
        }
    }

    /// True when the server answers its base URL with a status below 400.
    pub fn check_reachable(&self) -> bool {
        let transport = match Transport::insecure() {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Failed to create HTTP client: {}", e);
                return false;
            }
        };
        match transport.client().get(self.config.server_url()).send() {
            Ok(resp) => {
                let status = resp.status();
                info!("Securden server at {} answered {}", self.config.server_url(), status);
                status.as_u16() < 400
            }
            Err(e) => {
                info!("Failed to connect to {}: {}", self.config.server_url(), e);
                false
            }
        }
    }
}

fn send(transport: &Transport, request: &WireRequest) -> Result<Vec<u8>, VaultError> {
    let response = request
        .to_builder(transport.client())
        .send()
        .map_err(|e| VaultError::Request(e.to_string()))?;
    debug!("{} {} -> {}", request.method, request.url.path(), response.status());
    response
        .bytes()
        .map(|bytes| bytes.to_vec())
        .map_err(|e| VaultError::Body(e.to_string()))
}
