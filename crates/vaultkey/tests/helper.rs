//! End-to-end helper runs against a mock AWS Secrets Manager endpoint

#![allow(clippy::unwrap_used, clippy::expect_used)]

use clap::Parser;
use serde_json::{Value, json};
use std::path::Path;
use vaultkey::cli::Cli;
use vaultkey::error::Error;
use vaultkey::{BackendRegistry, BackendType, ConfigFile, MemorySink, SecretBackend};
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_aws(server: &MockServer, secret_string: &str) {
    Mock::given(method("POST"))
        .and(header("x-amz-target", "secretsmanager.GetSecretValue"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-amz-json-1.1")
                .set_body_json(json!({"Name": "prod/db", "SecretString": secret_string})),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn write_config(dir: &Path, server: &MockServer) -> std::path::PathBuf {
    let path = dir.join("vaultkey.yaml");
    std::fs::write(
        &path,
        format!(
            "backends:
  prod-db:
    backend_type: aws.secretsmanager
    secret_id: prod/db
    aws_region: us-east-1
    aws_access_key_id: AKIDEXAMPLE
    aws_secret_access_key: wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY
    endpoint_url: {uri}
  legacy:
    backend_type: gcp.secretmanager
    secret_id: old
",
            uri = server.uri()
        ),
    )
    .unwrap();
    path
}

fn cli_for(path: &Path) -> Cli {
    Cli::try_parse_from(["vaultkey", "--config", path.to_str().unwrap()]).unwrap()
}

#[tokio::test]
async fn test_helper_answers_every_handle() {
    let server = MockServer::start().await;
    mock_aws(&server, r#"{"db_password":"hunter2","db_user":"app"}"#).await;
    let dir = tempfile::tempdir().unwrap();
    let cli = cli_for(&write_config(dir.path(), &server));

    let request = json!({
        "version": "1.0",
        "secrets": [
            "prod-db:db_password",
            "prod-db:db_user",
            "prod-db:missing",
            "legacy:anything",
            "ghost:key",
            "no-separator",
        ]
    })
    .to_string();

    let sink = MemorySink::new();
    let output = cli.run(&request, &sink).await.unwrap();
    let response: Value = serde_json::from_str(&output).unwrap();

    assert_eq!(
        response["prod-db:db_password"],
        json!({"value": "hunter2", "error": null})
    );
    assert_eq!(response["prod-db:db_user"]["value"], "app");
    assert_eq!(
        response["prod-db:missing"],
        json!({"value": null, "error": "backend does not provide secret key"})
    );
    assert_eq!(response["ghost:key"]["error"], "backend not configured");
    assert_eq!(response["no-separator"]["error"], "invalid secret handle");

    let legacy = response["legacy:anything"]["error"].as_str().unwrap();
    assert!(legacy.contains("gcp.secretmanager"), "{legacy}");
    assert!(response["legacy:anything"]["value"].is_null());

    assert_eq!(response.as_object().unwrap().len(), 6);

    // One GetSecretValue for three prod-db handles
    server.verify().await;
}

#[tokio::test]
async fn test_unreferenced_backends_are_not_constructed() {
    let server = MockServer::start().await;
    mock_aws(&server, r#"{"k":"v"}"#).await;
    let dir = tempfile::tempdir().unwrap();
    let cli = cli_for(&write_config(dir.path(), &server));

    let sink = MemorySink::new();
    let output = cli
        .run(r#"{"version": "1.0", "secrets": ["ghost:key"]}"#, &sink)
        .await
        .unwrap();

    assert_eq!(
        serde_json::from_str::<Value>(&output).unwrap(),
        json!({"ghost:key": {"value": null, "error": "backend not configured"}})
    );
    assert!(sink.is_empty());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_unsupported_version_aborts_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let cli = cli_for(&write_config(dir.path(), &server));

    let err = cli
        .run(r#"{"version": "2.0", "secrets": ["prod-db:db_password"]}"#, &MemorySink::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedVersion { .. }));
    assert_eq!(err.exit_code(), 2);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_invalid_config_file_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vaultkey.yaml");
    std::fs::write(&path, "backends: [not, a, mapping]\n").unwrap();

    let err = cli_for(&path)
        .run(r#"{"version": "1.0", "secrets": []}"#, &MemorySink::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConfigParse { .. }));
}

#[tokio::test]
async fn test_registry_shares_constructed_backend() {
    let server = MockServer::start().await;
    mock_aws(&server, r#"{"db_password":"hunter2"}"#).await;
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigFile::load(&write_config(dir.path(), &server)).unwrap();

    let sink = MemorySink::new();
    let mut registry = BackendRegistry::new();
    let created = registry
        .create_from_config("prod-db", config.backend("prod-db").unwrap(), &sink)
        .await
        .unwrap();

    let resolved = registry.resolve("prod-db").unwrap();
    assert!(std::sync::Arc::ptr_eq(&created, &resolved));
    assert_eq!(resolved.backend_type(), BackendType::AwsSecretsManager);
    assert_eq!(
        resolved.get_secret_output("db_password", &sink).value(),
        Some("hunter2")
    );
    assert_eq!(registry.backend_ids(), vec!["prod-db"]);
}
