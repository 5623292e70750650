mod common;

use common::{certificate_file, init_logging, MockServer, TlsMockServer};
use securden_bridge::vault::accounts::{AddAccountRequest, GET_ACCOUNTS_PATH};
use securden_bridge::vault::tls::{resolve_transport, TrustMode};
use securden_bridge::vault::{ConfigValue, VaultError};
use securden_bridge::{ConnectionConfig, VaultClient};

#[test]
fn test_unreachable_server_with_pinned_certificate() {
    init_logging();
    let cert = certificate_file();
    let config =
        ConnectionConfig::new("https://127.0.0.1:1", "token", cert.path().to_str()).unwrap();
    assert_eq!(resolve_transport(&config).unwrap().mode(), TrustMode::Pinned);

    let outcome = VaultClient::new(config).add_account(&AddAccountRequest::default());
    assert_eq!(outcome.status, 500);
    assert!(outcome.message.starts_with("Error in API call"));
    assert!(outcome.message.contains("request failed"));
    assert!(outcome.message.contains("insecure client"));
}

#[test]
fn test_unreachable_server_without_certificate() {
    init_logging();
    let config = ConnectionConfig::new("https://127.0.0.1:1", "token", None).unwrap();
    assert_eq!(resolve_transport(&config).unwrap().mode(), TrustMode::Insecure);

    let outcome = VaultClient::new(config).get_accounts(&[ConfigValue::Known(1)]);
    assert_eq!(outcome.status, 500);
    assert!(outcome.message.contains("request failed"));
}

#[test]
fn test_certificate_directory_is_rejected_at_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConnectionConfig::new(
        "https://vault.example.com:5959",
        "token",
        dir.path().to_str(),
    )
    .unwrap_err();
    assert!(matches!(err, VaultError::InvalidCertificate(_)));
}

#[test]
fn test_certificate_directory_falls_back_to_insecure() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig::new("https://vault.example.com:5959", "token", None)
        .unwrap()
        .with_unchecked_certificate(dir.path().to_str().unwrap());
    let transport = resolve_transport(&config).unwrap();
    assert_eq!(transport.mode(), TrustMode::Insecure);
}

#[test]
fn test_none_certificate_means_auto() {
    let config =
        ConnectionConfig::new("https://vault.example.com:5959", "token", Some("None")).unwrap();
    assert_eq!(config.certificate(), "");
}

#[test]
fn test_plain_http_is_never_pinned() {
    init_logging();
    let server = MockServer::start(&[(GET_ACCOUNTS_PATH, 200, r#"{}"#)]);
    let cert = certificate_file();
    let config = ConnectionConfig::new(&server.url, "token", cert.path().to_str()).unwrap();
    assert_eq!(resolve_transport(&config).unwrap().mode(), TrustMode::Plain);

    let outcome = VaultClient::new(config).get_accounts(&[]);
    assert_eq!(outcome.status, 200);
    assert!(outcome.record.is_empty());
}

const ACCOUNTS_BODY: &str = r#"{"7":{"account_name":"db","port":5432}}"#;

#[test]
fn test_fetched_server_certificate_is_pinned() {
    init_logging();
    let server = TlsMockServer::start(ACCOUNTS_BODY);
    let config = ConnectionConfig::new(&server.url, "token", None).unwrap();
    assert_eq!(resolve_transport(&config).unwrap().mode(), TrustMode::Pinned);

    let outcome = VaultClient::new(config).get_accounts(&[ConfigValue::Known(7)]);
    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.record["7"]["port"], "5432");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, GET_ACCOUNTS_PATH);
    assert_eq!(requests[0].authtoken.as_deref(), Some("token"));
}

#[test]
fn test_configured_server_certificate_is_pinned() {
    init_logging();
    let server = TlsMockServer::start(ACCOUNTS_BODY);
    let cert = server.certificate_file();
    let config = ConnectionConfig::new(&server.url, "token", cert.path().to_str()).unwrap();
    assert_eq!(resolve_transport(&config).unwrap().mode(), TrustMode::Pinned);

    let outcome = VaultClient::new(config).get_accounts(&[ConfigValue::Known(7)]);
    assert_eq!(outcome.status, 200);
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn test_wrong_pinned_certificate_recovers_through_insecure_retry() {
    init_logging();
    let server = TlsMockServer::start(ACCOUNTS_BODY);
    let unrelated = certificate_file();
    let config =
        ConnectionConfig::new(&server.url, "token", unrelated.path().to_str()).unwrap();
    assert_eq!(resolve_transport(&config).unwrap().mode(), TrustMode::Pinned);

    let outcome = VaultClient::new(config).get_accounts(&[ConfigValue::Known(7)]);
    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.record["7"]["account_name"], "db");

    // The pinned attempt fails during the handshake, so only the retry
    // reaches the server.
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].json_body(), serde_json::json!({"account_ids": [7]}));
}
