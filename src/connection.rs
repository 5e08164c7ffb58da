use reqwest::{Client, Method, RequestBuilder};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::credentials::{
    check_emulator_host, fetch_access_token, peek_project_id, AccessToken, CredentialFile, CredentialSource,
    DEFAULT_EMULATOR_PROJECT, EMULATOR_TOKEN,
};
use crate::errors::ProbeError;

/// Handle to the remote document store.
///
/// Built once per run by [`Connector`] and passed explicitly to every
/// operation. Dropped at process exit; there is no teardown.
#[derive(Debug)]
pub struct FirestoreConnection {
    client: Client,
    api_root: String,
    project_id: String,
    database_id: String,
    bearer_token: String,
    source: CredentialSource,
}

impl FirestoreConnection {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// `{root}/v1/projects/{project}/databases/{database}/documents`
    pub fn documents_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents",
            self.api_root,
            urlencoding::encode(&self.project_id),
            self.database_id
        )
    }

    /// URL for a collection or document path below the documents root
    pub fn url_for_path(&self, segments: &[&str]) -> String {
        let mut url = self.documents_url();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.bearer_token)
    }
}

/// Establishes the connection at most once.
///
/// The first successful `establish` caches the handle; later calls return
/// the same `Arc` without touching any credential source.
pub struct Connector {
    config: ProbeConfig,
    connection: OnceCell<Arc<FirestoreConnection>>,
}

impl Connector {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            connection: OnceCell::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }

    pub async fn establish(&self) -> Result<Arc<FirestoreConnection>, ProbeError> {
        if let Some(connection) = self.connection.get() {
            info!("✅ Firestore connection already initialized");
            info!("   Project: {}", connection.project_id);
            return Ok(connection.clone());
        }

        let connection = self
            .connection
            .get_or_try_init(|| async { self.connect().await.map(Arc::new) })
            .await?;

        info!("🎯 Connected to project: {}", connection.project_id);
        Ok(connection.clone())
    }

    async fn connect(&self) -> Result<FirestoreConnection, ProbeError> {
        self.config.validate()?;

        let client = Client::builder()
            .timeout(self.config.timeout())
            .build()
            .map_err(|e| ProbeError::network(format!("failed to build HTTP client: {}", e)))?;

        let source = CredentialSource::resolve(&self.config);

        let (api_root, project_id, bearer_token) = match &source {
            CredentialSource::ServiceAccountFile(path) => {
                let logged_project = peek_project_id(path).await;
                info!(
                    "📋 Service account project ID: {}",
                    logged_project.as_deref().unwrap_or("Unknown")
                );

                let credentials = CredentialFile::load(path).await?;
                if !matches!(credentials, CredentialFile::ServiceAccount(_)) {
                    return Err(ProbeError::credential(format!(
                        "{} is not a service account key",
                        path.display()
                    )));
                }

                let project_id = self.project_for(&credentials)?;
                let token = fetch_access_token(&client, &credentials).await?;
                info!("✅ Firestore initialized with {}", source.label());
                (self.remote_root(), project_id, bearer(token))
            }
            CredentialSource::ApplicationDefault(path) => {
                let credentials = CredentialFile::load(path).await?;
                let project_id = self.project_for(&credentials)?;
                let token = fetch_access_token(&client, &credentials).await?;
                info!("✅ Firestore initialized with {}", source.label());
                (self.remote_root(), project_id, bearer(token))
            }
            CredentialSource::Emulator { host } => {
                check_emulator_host(host)?;
                warn!("⚠️  No credentials found. Attempting to connect to {} at {}...", source.label(), host);
                let project_id = self
                    .config
                    .project_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EMULATOR_PROJECT.to_string());
                info!("✅ Firestore initialized with {}", source.label());
                (format!("http://{}", host), project_id, EMULATOR_TOKEN.to_string())
            }
        };

        Ok(FirestoreConnection {
            client,
            api_root,
            project_id,
            database_id: self.config.database_id.clone(),
            bearer_token,
            source,
        })
    }

    fn remote_root(&self) -> String {
        self.config.firestore_url.trim_end_matches('/').to_string()
    }

    fn project_for(&self, credentials: &CredentialFile) -> Result<String, ProbeError> {
        self.config
            .project_id
            .clone()
            .or_else(|| credentials.project_id().map(str::to_string))
            .ok_or_else(|| {
                ProbeError::credential("no project ID in credentials; set GOOGLE_CLOUD_PROJECT or --project")
            })
    }
}

fn bearer(token: AccessToken) -> String {
    if let Some(expires_at) = token.expires_at {
        debug!("Access token valid until {}", expires_at);
    }
    token.token
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn emulator_config(dir: &TempDir) -> ProbeConfig {
        ProbeConfig {
            key_file: dir.path().join("serviceAccountKey.json"),
            emulator_host: Some("127.0.0.1:8080".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_emulator_connection_urls() {
        let dir = TempDir::new().unwrap();
        let connector = Connector::new(emulator_config(&dir));
        assert!(!connector.is_connected());

        let connection = connector.establish().await.unwrap();
        assert!(connector.is_connected());
        assert_eq!(connection.project_id(), "demo-project");
        assert_eq!(connection.api_root(), "http://127.0.0.1:8080");
        assert_eq!(
            connection.url_for_path(&["test_collection", "abc"]),
            "http://127.0.0.1:8080/v1/projects/demo-project/databases/(default)/documents/test_collection/abc"
        );
    }

    #[tokio::test]
    async fn test_establish_returns_cached_handle() {
        let dir = TempDir::new().unwrap();
        let connector = Connector::new(emulator_config(&dir));

        let first = connector.establish().await.unwrap();
        let second = connector.establish().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_missing_environment_credentials_fail() {
        let dir = TempDir::new().unwrap();
        let config = ProbeConfig {
            application_credentials: Some(dir.path().join("does-not-exist.json")),
            ..emulator_config(&dir)
        };
        let connector = Connector::new(config);

        let err = connector.establish().await.unwrap_err();
        assert!(matches!(err, ProbeError::Credential { .. }));
        assert!(!connector.is_connected());
    }

    #[tokio::test]
    async fn test_malformed_emulator_host_fails_when_emulator_is_used() {
        let dir = TempDir::new().unwrap();
        let config = ProbeConfig {
            emulator_host: Some("http://localhost:8080".to_string()),
            ..emulator_config(&dir)
        };
        let err = Connector::new(config).establish().await.unwrap_err();
        assert!(matches!(err, ProbeError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_connecting() {
        let dir = TempDir::new().unwrap();
        let config = ProbeConfig {
            firestore_url: "ftp://nowhere".to_string(),
            ..emulator_config(&dir)
        };
        let err = Connector::new(config).establish().await.unwrap_err();
        assert!(matches!(err, ProbeError::Configuration { .. }));
    }
}
