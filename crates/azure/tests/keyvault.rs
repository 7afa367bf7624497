//! Azure Key Vault backend tests against mock token and vault endpoints

#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use vaultkey_azure::AzureKeyVaultBackend;
use vaultkey_secrets::diagnostics::events;
use vaultkey_secrets::{
    BackendError, BackendType, KEY_NOT_FOUND_MESSAGE, MemorySink, RawBackendConfig, SecretBackend,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "72f988bf-86f1-41af-91ab-2d7cd011db47";
const CLIENT_SECRET: &str = "Zx8Q~not-a-real-client-secret";
const ACCESS_TOKEN: &str = "eyJ0eXAiOiJKV1QiLCJhbGciOi-mock-token";

fn raw(value: serde_json::Value) -> RawBackendConfig {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

/// Config using one mock server as both authority and vault
fn config_for(server: &MockServer) -> RawBackendConfig {
    raw(json!({
        "backend_type": "azure.keyvault",
        "keyvaulturl": server.uri(),
        "secret_id": "app-secrets",
        "azure_session": {
            "azure_tenant_id": TENANT,
            "azure_client_id": "client-1",
            "azure_client_secret": CLIENT_SECRET,
            "azure_authority_host": server.uri(),
        }
    }))
}

async fn mock_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": ACCESS_TOKEN,
        })))
        .mount(server)
        .await;
}

async fn mock_secret(server: &MockServer, value: &str) {
    Mock::given(method("GET"))
        .and(path("/secrets/app-secrets"))
        .and(query_param("api-version", "7.4"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": value,
            "id": "https://myvault.vault.azure.net/secrets/app-secrets/4387e9f3d6e14c459867679a90fd0f79",
            "attributes": {"enabled": true}
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_every_key_round_trips() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    mock_secret(&server, r#"{"api_key":"abc123","db_password":"hunter2"}"#).await;

    let sink = MemorySink::new();
    let backend = AzureKeyVaultBackend::new("az-test", &config_for(&server), &sink)
        .await
        .unwrap();

    assert_eq!(backend.backend_type(), BackendType::AzureKeyVault);
    assert_eq!(backend.get_secret_output("api_key", &sink).value(), Some("abc123"));
    assert_eq!(backend.get_secret_output("db_password", &sink).value(), Some("hunter2"));

    let miss = backend.get_secret_output("missing", &sink);
    assert_eq!(miss.value(), None);
    assert_eq!(miss.error(), Some(KEY_NOT_FOUND_MESSAGE));

    let misses = sink.events(events::KEY_NOT_FOUND);
    assert_eq!(misses.len(), 1);
    assert!(
        misses[0]
            .identifiers
            .contains(&("keyvaulturl", server.uri()))
    );

    server.verify().await;
}

#[tokio::test]
async fn test_pinned_version_is_requested() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/secrets/app-secrets/4387e9f3d6e14c459867679a90fd0f79"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": r#"{"k":"v"}"#})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.insert(
        "secret_version".to_string(),
        json!("4387e9f3d6e14c459867679a90fd0f79"),
    );

    let sink = MemorySink::new();
    let backend = AzureKeyVaultBackend::new("az-test", &config, &sink)
        .await
        .unwrap();
    assert_eq!(backend.get_secret_output("k", &sink).value(), Some("v"));
    server.verify().await;
}

#[tokio::test]
async fn test_nested_json_fails_with_parse_error() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    mock_secret(&server, r#"{"a": ["not", "flat"]}"#).await;

    let sink = MemorySink::new();
    let err = AzureKeyVaultBackend::new("az-test", &config_for(&server), &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Parse { .. }));
    assert_eq!(sink.events(events::PARSE_FAILED).len(), 1);
}

#[tokio::test]
async fn test_missing_secret_fails_with_fetch_error() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/secrets/app-secrets"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": "SecretNotFound",
                "message": "A secret with (name/id) app-secrets was not found in this key vault."
            }
        })))
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let err = AzureKeyVaultBackend::new("az-test", &config_for(&server), &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Fetch { .. }));
    assert!(err.to_string().contains("SecretNotFound"));

    let records = sink.events(events::FETCH_FAILED);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].secret_id.as_deref(), Some("app-secrets"));
}

#[tokio::test]
async fn test_rejected_token_fails_session_init() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let err = AzureKeyVaultBackend::new("az-test", &config_for(&server), &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::SessionInit { .. }));
    assert!(err.to_string().contains("AADSTS7000215"));
    assert_eq!(sink.events(events::SESSION_FAILED).len(), 1);

    // No vault request after a failed sign-in
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| r.method.as_str() == "POST"));
}

#[tokio::test]
async fn test_session_falls_back_to_environment() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    mock_secret(&server, r#"{"k":"v"}"#).await;

    let config = raw(json!({
        "backend_type": "azure.keyvault",
        "keyvaulturl": server.uri(),
        "secret_id": "app-secrets",
    }));
    let authority = server.uri();

    temp_env::async_with_vars(
        [
            ("AZURE_TENANT_ID", Some(TENANT)),
            ("AZURE_CLIENT_ID", Some("client-1")),
            ("AZURE_CLIENT_SECRET", Some(CLIENT_SECRET)),
            ("AZURE_AUTHORITY_HOST", Some(authority.as_str())),
        ],
        async {
            let sink = MemorySink::new();
            let backend = AzureKeyVaultBackend::new("az-test", &config, &sink)
                .await
                .unwrap();
            assert_eq!(backend.get_secret_output("k", &sink).value(), Some("v"));
        },
    )
    .await;
}

#[tokio::test]
async fn test_unreachable_vault_fails_with_fetch_error() {
    let server = MockServer::start().await;
    mock_token(&server).await;

    let mut config = config_for(&server);
    config.insert("keyvaulturl".to_string(), json!("http://127.0.0.1:9"));

    let sink = MemorySink::new();
    let err = AzureKeyVaultBackend::new("az-test", &config, &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Fetch { .. }));
    let records = sink.events(events::FETCH_FAILED);
    assert_eq!(records.len(), 1);
    assert!(
        records[0]
            .identifiers
            .contains(&("keyvaulturl", "http://127.0.0.1:9".to_string()))
    );
}

#[tokio::test]
async fn test_diagnostics_never_carry_credentials_or_values() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    mock_secret(&server, r#"{"db_password":"hunter2"}"#).await;

    let sink = MemorySink::new();
    let backend = AzureKeyVaultBackend::new("az-test", &config_for(&server), &sink)
        .await
        .unwrap();
    let _ = backend.get_secret_output("missing", &sink);

    let dump = format!("{:?} {:?}", sink.records(), backend);
    assert!(!dump.contains("hunter2"));
    assert!(!dump.contains(CLIENT_SECRET));
    assert!(!dump.contains(ACCESS_TOKEN));
}
