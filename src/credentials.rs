use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::errors::ProbeError;

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_EMULATOR_HOST: &str = "localhost:8080";
pub const DEFAULT_EMULATOR_PROJECT: &str = "demo-project";
/// The emulator accepts this token as an admin credential
pub const EMULATOR_TOKEN: &str = "owner";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Where the connection's credentials come from, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Local service-account key file
    ServiceAccountFile(PathBuf),
    /// File named by `GOOGLE_APPLICATION_CREDENTIALS`
    ApplicationDefault(PathBuf),
    /// Local emulator at `host:port`
    Emulator { host: String },
}

impl CredentialSource {
    /// Picks the first source that is present. Nothing is loaded or
    /// validated here; a present-but-broken source fails later when loaded.
    pub fn resolve(config: &ProbeConfig) -> Self {
        if config.key_file.is_file() {
            return CredentialSource::ServiceAccountFile(config.key_file.clone());
        }

        if let Some(path) = &config.application_credentials {
            return CredentialSource::ApplicationDefault(path.clone());
        }

        CredentialSource::Emulator {
            host: config
                .emulator_host
                .clone()
                .unwrap_or_else(|| DEFAULT_EMULATOR_HOST.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CredentialSource::ServiceAccountFile(_) => "service account key",
            CredentialSource::ApplicationDefault(_) => "environment credentials",
            CredentialSource::Emulator { .. } => "local emulator",
        }
    }

    pub fn is_emulator(&self) -> bool {
        matches!(self, CredentialSource::Emulator { .. })
    }
}

/// Checks an emulator address is in `host:port` form.
pub fn check_emulator_host(host: &str) -> Result<(), ProbeError> {
    let port_ok = host
        .rsplit_once(':')
        .is_some_and(|(name, port)| !name.is_empty() && port.parse::<u16>().is_ok());
    if host.contains("://") || !port_ok {
        return Err(ProbeError::configuration(format!(
            "Emulator host '{}' must be in host:port form",
            host
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    pub token_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUserCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub quota_project_id: Option<String>,
    pub token_uri: Option<String>,
}

/// A parsed credential file
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserCredentials),
}

impl CredentialFile {
    pub async fn load(path: &Path) -> Result<Self, ProbeError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProbeError::credential(format!("cannot read credential file '{}': {}", path.display(), e))
        })?;
        Self::parse(&raw).map_err(|e| match e {
            ProbeError::Credential { details } => {
                ProbeError::credential(format!("{}: {}", path.display(), details))
            }
            other => other,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, ProbeError> {
        serde_json::from_str(raw)
            .map_err(|e| ProbeError::credential(format!("unsupported or malformed credential file: {}", e)))
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            CredentialFile::ServiceAccount(key) => key.project_id.as_deref(),
            CredentialFile::AuthorizedUser(creds) => creds.quota_project_id.as_deref(),
        }
    }

    pub fn token_uri(&self) -> &str {
        let uri = match self {
            CredentialFile::ServiceAccount(key) => key.token_uri.as_deref(),
            CredentialFile::AuthorizedUser(creds) => creds.token_uri.as_deref(),
        };
        uri.unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// Reads only `project_id` from a key file, for logging.
pub async fn peek_project_id(path: &Path) -> Option<String> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    value.get("project_id")?.as_str().map(str::to_string)
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Builds the signed RS256 assertion for the JWT-bearer grant.
pub fn sign_assertion(key: &ServiceAccountKey, token_uri: &str, now: DateTime<Utc>) -> Result<String, ProbeError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: DATASTORE_SCOPE,
        aud: token_uri,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(encode(&header, &claims, &encoding_key)?)
}

/// Exchanges the credential file for an OAuth2 access token.
pub async fn fetch_access_token(client: &Client, credentials: &CredentialFile) -> Result<AccessToken, ProbeError> {
    let token_uri = credentials.token_uri();
    let now = Utc::now();

    let form: Vec<(&str, String)> = match credentials {
        CredentialFile::ServiceAccount(key) => {
            debug!("Requesting access token for {} from {}", key.client_email, token_uri);
            vec![
                ("grant_type", JWT_BEARER_GRANT.to_string()),
                ("assertion", sign_assertion(key, token_uri, now)?),
            ]
        }
        CredentialFile::AuthorizedUser(creds) => {
            debug!("Refreshing user access token from {}", token_uri);
            vec![
                ("grant_type", "refresh_token".to_string()),
                ("client_id", creds.client_id.clone()),
                ("client_secret", creds.client_secret.clone()),
                ("refresh_token", creds.refresh_token.clone()),
            ]
        }
    };

    let response = client
        .post(token_uri)
        .form(&form)
        .send()
        .await
        .map_err(|e| ProbeError::network(format!("token request to {} failed: {}", token_uri, e)))?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let details = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => body,
        };
        return Err(ProbeError::credential(format!(
            "token endpoint rejected credentials (HTTP {}): {}",
            status.as_u16(),
            details
        )));
    }

    let token: TokenResponse = serde_json::from_str(&body)?;
    info!("🔑 Obtained access token from {}", token_uri);

    Ok(AccessToken {
        token: token.access_token,
        expires_at: token.expires_in.map(|secs| now + Duration::seconds(secs)),
    })
}
