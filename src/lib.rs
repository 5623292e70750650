//! securden-bridge - Securden secrets-management bridge
//!
//! This crate lets a declarative configuration host manage accounts stored on
//! a Securden server. Typed host attributes are turned into REST calls, and the
//! loosely typed JSON the server answers with is flattened back into records.
//!
//! ## Architecture
//!
//! - `vault` module - the request/response bridge (parameters, trust,
//!   request building, normalization, account operations)
//! - `interface` module - the `AccountOperations` trait hosts program against
//! - `cli` module - command-line host driving the operations
//!
//! Configuration is an immutable [`vault::ConnectionConfig`] built once and
//! passed to [`vault::VaultClient`]; nothing is stored globally.

pub mod cli;
pub mod interface;
pub mod vault;

pub use interface::AccountOperations;
pub use vault::{ConnectionConfig, Outcome, VaultClient, VaultError};

use tracing_subscriber::EnvFilter;

/// Initialize logging for tests and embedding hosts
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer() // This ensures output goes to both stdout and test output
        .try_init();
}
