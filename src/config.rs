use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::errors::ProbeError;
use crate::models::CollectionName;
use crate::smoke::{SmokeTestOptions, DEFAULT_COLLECTION};

pub const DEFAULT_KEY_FILE: &str = "serviceAccountKey.json";
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com";
pub const DEFAULT_DATABASE_ID: &str = "(default)";

#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub key_file: PathBuf,
    pub application_credentials: Option<PathBuf>,
    pub emulator_host: Option<String>,
    pub project_id: Option<String>,
    pub database_id: String,
    pub firestore_url: String,
    pub collection_name: String,
    pub perform_cleanup: bool,
    pub timeout_seconds: u64,
}

/// Values supplied on the command line; `None` keeps the environment value.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub collection_name: Option<String>,
    pub perform_cleanup: Option<bool>,
    pub key_file: Option<PathBuf>,
    pub project_id: Option<String>,
    pub emulator_host: Option<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            application_credentials: None,
            emulator_host: None,
            project_id: None,
            database_id: DEFAULT_DATABASE_ID.to_string(),
            firestore_url: DEFAULT_FIRESTORE_URL.to_string(),
            collection_name: DEFAULT_COLLECTION.to_string(),
            perform_cleanup: false,
            timeout_seconds: 30,
        }
    }
}

impl ProbeConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            key_file: non_empty("DOCPROBE_KEY_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.key_file),
            application_credentials: non_empty("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            emulator_host: non_empty("FIRESTORE_EMULATOR_HOST"),
            project_id: non_empty("GOOGLE_CLOUD_PROJECT").or_else(|| non_empty("GCLOUD_PROJECT")),
            database_id: non_empty("DOCPROBE_DATABASE").unwrap_or(defaults.database_id),
            firestore_url: non_empty("DOCPROBE_FIRESTORE_URL").unwrap_or(defaults.firestore_url),
            collection_name: non_empty("DOCPROBE_COLLECTION").unwrap_or(defaults.collection_name),
            perform_cleanup: non_empty("DOCPROBE_CLEANUP")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.perform_cleanup),
            timeout_seconds: non_empty("DOCPROBE_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_seconds),
        }
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(collection_name) = overrides.collection_name {
            self.collection_name = collection_name;
        }
        if let Some(perform_cleanup) = overrides.perform_cleanup {
            self.perform_cleanup = perform_cleanup;
        }
        if let Some(key_file) = overrides.key_file {
            self.key_file = key_file;
        }
        if let Some(project_id) = overrides.project_id {
            self.project_id = Some(project_id);
        }
        if let Some(emulator_host) = overrides.emulator_host {
            self.emulator_host = Some(emulator_host);
        }
    }

    pub fn validate(&self) -> Result<(), ProbeError> {
        let url = Url::parse(&self.firestore_url).map_err(|e| {
            ProbeError::configuration(format!("Invalid Firestore URL '{}': {}", self.firestore_url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ProbeError::configuration(
                "Firestore URL must start with http:// or https://",
            ));
        }

        if self.database_id.is_empty() {
            return Err(ProbeError::configuration("Database ID cannot be empty"));
        }

        if self.timeout_seconds == 0 {
            return Err(ProbeError::configuration("Timeout must be at least one second"));
        }

        Ok(())
    }

    pub fn smoke_options(&self) -> Result<SmokeTestOptions, ProbeError> {
        Ok(SmokeTestOptions {
            collection_name: CollectionName::new(self.collection_name.clone())?,
            perform_cleanup: self.perform_cleanup,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
