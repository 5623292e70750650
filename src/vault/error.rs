#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported API version: {0}")]
    InvalidApiVersion(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("failed to parse URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to create request: {0}")]
    Build(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("request failed even with insecure client: {0}")]
    InsecureRetry(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("TLS error: {0}")]
    Tls(#[from] openssl::error::ErrorStack),

    #[error("failed to connect: {0}")]
    Handshake(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error from reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
}
