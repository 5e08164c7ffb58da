use docprobe::config::ProbeConfig;
use docprobe::credentials::CredentialSource;
use docprobe::smoke::{failure_message, FAILURE_EXIT_CODE};
use docprobe::{ConnectivitySmokeTest, Connector, DocumentStore, ProbeError, SmokeTestOptions};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY_PEM: &str = include_str!("fixtures/test_service_account_key.pem");

fn write_service_account_key(dir: &TempDir, file_name: &str, token_uri: &str) -> PathBuf {
    let key = json!({
        "type": "service_account",
        "project_id": "probe-project",
        "private_key_id": "0123456789abcdef",
        "private_key": TEST_KEY_PEM,
        "client_email": "docprobe@probe-project.iam.gserviceaccount.com",
        "client_id": "1234567890",
        "token_uri": token_uri
    });
    let path = dir.path().join(file_name);
    std::fs::write(&path, serde_json::to_string_pretty(&key).unwrap()).unwrap();
    path
}

async fn mount_token_endpoint(mock_server: &MockServer, grant: &str, token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(grant))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_service_account_key_file_flow() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let key_file = write_service_account_key(&dir, "serviceAccountKey.json", &format!("{}/token", mock_server.uri()));

    mount_token_endpoint(&mock_server, "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer", "ya29.service", 1).await;

    Mock::given(method("POST"))
        .and(path("/v1/projects/probe-project/databases/(default)/documents:listCollectionIds"))
        .and(header("authorization", "Bearer ya29.service"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "collectionIds": ["test_collection"] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ProbeConfig {
        key_file: key_file.clone(),
        firestore_url: mock_server.uri(),
        // Both lower-priority sources are present and must be ignored
        application_credentials: Some(dir.path().join("unused.json")),
        emulator_host: Some("localhost:1".to_string()),
        ..Default::default()
    };
    let connector = Connector::new(config);
    let connection = connector.establish().await.unwrap();

    assert_eq!(connection.source(), &CredentialSource::ServiceAccountFile(key_file));
    assert_eq!(connection.project_id(), "probe-project");
    assert_eq!(connection.list_collections().await.unwrap(), vec!["test_collection"]);
}

#[tokio::test]
async fn test_establish_is_idempotent() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let key_file = write_service_account_key(&dir, "serviceAccountKey.json", &format!("{}/token", mock_server.uri()));

    // A second token request would violate this expectation on drop
    mount_token_endpoint(&mock_server, "jwt-bearer", "ya29.once", 1).await;

    let connector = Connector::new(ProbeConfig {
        key_file,
        firestore_url: mock_server.uri(),
        ..Default::default()
    });

    let first = connector.establish().await.unwrap();
    let second = connector.establish().await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_environment_service_account_credentials() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let creds = write_service_account_key(&dir, "adc.json", &format!("{}/token", mock_server.uri()));

    mount_token_endpoint(&mock_server, "jwt-bearer", "ya29.adc", 1).await;

    let connector = Connector::new(ProbeConfig {
        key_file: dir.path().join("serviceAccountKey.json"),
        application_credentials: Some(creds.clone()),
        firestore_url: mock_server.uri(),
        project_id: Some("override-project".to_string()),
        ..Default::default()
    });
    let connection = connector.establish().await.unwrap();

    assert_eq!(connection.source(), &CredentialSource::ApplicationDefault(creds));
    assert_eq!(connection.project_id(), "override-project");
}

#[tokio::test]
async fn test_environment_authorized_user_credentials() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let creds = dir.path().join("user.json");
    std::fs::write(
        &creds,
        json!({
            "type": "authorized_user",
            "client_id": "client.apps.googleusercontent.com",
            "client_secret": "shh",
            "refresh_token": "1//refresh",
            "quota_project_id": "user-project",
            "token_uri": format!("{}/token", mock_server.uri())
        })
        .to_string(),
    )
    .unwrap();

    mount_token_endpoint(&mock_server, "grant_type=refresh_token", "ya29.user", 1).await;

    let connector = Connector::new(ProbeConfig {
        key_file: dir.path().join("serviceAccountKey.json"),
        application_credentials: Some(creds),
        firestore_url: mock_server.uri(),
        ..Default::default()
    });
    let connection = connector.establish().await.unwrap();

    assert_eq!(connection.project_id(), "user-project");
    assert!(!connection.source().is_emulator());
}

#[tokio::test]
async fn test_rejected_token_request_is_credential_error() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let key_file = write_service_account_key(&dir, "serviceAccountKey.json", &format!("{}/token", mock_server.uri()));

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&mock_server)
        .await;

    let connector = Connector::new(ProbeConfig {
        key_file,
        firestore_url: mock_server.uri(),
        ..Default::default()
    });

    match connector.establish().await.unwrap_err() {
        ProbeError::Credential { details } => {
            assert!(details.contains("invalid_grant"));
            assert!(details.contains("Invalid JWT Signature."));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!connector.is_connected());
}

#[tokio::test]
async fn test_malformed_key_file_is_credential_error() {
    let dir = TempDir::new().unwrap();
    let key_file = dir.path().join("serviceAccountKey.json");
    std::fs::write(&key_file, "{ this is not json").unwrap();

    let connector = Connector::new(ProbeConfig {
        key_file,
        ..Default::default()
    });

    let err = connector.establish().await.unwrap_err();
    assert!(matches!(err, ProbeError::Credential { .. }));
    assert!(err.suggested_action().is_some());
}

#[tokio::test]
async fn test_emulator_fallback_without_credentials() {
    let dir = TempDir::new().unwrap();
    let connector = Connector::new(ProbeConfig {
        key_file: dir.path().join("serviceAccountKey.json"),
        project_id: Some("demo-local".to_string()),
        ..Default::default()
    });

    let connection = connector.establish().await.unwrap();
    assert_eq!(
        connection.source(),
        &CredentialSource::Emulator { host: "localhost:8080".to_string() }
    );
    assert_eq!(connection.api_root(), "http://localhost:8080");
    assert_eq!(connection.project_id(), "demo-local");
}

#[tokio::test]
async fn test_malformed_emulator_host_ignored_when_key_file_present() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let key_file = write_service_account_key(&dir, "serviceAccountKey.json", &format!("{}/token", mock_server.uri()));

    mount_token_endpoint(&mock_server, "jwt-bearer", "ya29.keyfile", 1).await;

    let connector = Connector::new(ProbeConfig {
        key_file: key_file.clone(),
        firestore_url: mock_server.uri(),
        emulator_host: Some("http://localhost:8080".to_string()),
        ..Default::default()
    });

    let connection = connector.establish().await.unwrap();
    assert_eq!(connection.source(), &CredentialSource::ServiceAccountFile(key_file));
    assert_eq!(connection.project_id(), "probe-project");
}

#[tokio::test]
async fn test_unreadable_credentials_abort_the_run() {
    let dir = TempDir::new().unwrap();
    let connector = Connector::new(ProbeConfig {
        key_file: dir.path().join("serviceAccountKey.json"),
        application_credentials: Some(dir.path().join("missing.json")),
        ..Default::default()
    });

    let err = ConnectivitySmokeTest::new(SmokeTestOptions::default())
        .execute(&connector)
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Credential { .. }));
    assert!(!connector.is_connected());

    let message = failure_message(&anyhow::Error::from(err));
    assert!(message.contains("Hint: Check serviceAccountKey.json or GOOGLE_APPLICATION_CREDENTIALS"));
    assert!(message.contains("🔧 Troubleshooting tips:"));
    assert_eq!(FAILURE_EXIT_CODE, 1);
}
