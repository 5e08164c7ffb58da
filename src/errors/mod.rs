use thiserror::Error;

/// Errors raised by the smoke test's remote operations.
///
/// Every store and credential call returns one of these so the runner can
/// decide per step whether to continue or abort.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Credential error: {details}")]
    Credential { details: String },

    #[error("Network error: {details}")]
    Network { details: String },

    #[error("Document '{collection}/{document_id}' not found")]
    NotFound { collection: String, document_id: String },

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response from document store: {details}")]
    InvalidResponse { details: String },

    #[error("Invalid configuration: {details}")]
    Configuration { details: String },
}

impl ProbeError {
    /// Stable error code for log lines
    pub fn error_code(&self) -> &'static str {
        match self {
            ProbeError::Credential { .. } => "CREDENTIAL_ERROR",
            ProbeError::Network { .. } => "NETWORK_ERROR",
            ProbeError::NotFound { .. } => "NOT_FOUND",
            ProbeError::Server { .. } => "SERVER_ERROR",
            ProbeError::InvalidResponse { .. } => "INVALID_RESPONSE",
            ProbeError::Configuration { .. } => "CONFIG_INVALID",
        }
    }

    pub fn suggested_action(&self) -> Option<String> {
        match self {
            ProbeError::Credential { .. } => {
                Some("Check serviceAccountKey.json or GOOGLE_APPLICATION_CREDENTIALS".to_string())
            }
            ProbeError::Network { .. } => {
                Some("Check your internet connection or that the emulator is running".to_string())
            }
            ProbeError::Server { status, .. } if *status == 404 => {
                Some("Verify Firestore is enabled for the target project".to_string())
            }
            ProbeError::Configuration { .. } => Some("Review the docprobe environment variables and flags".to_string()),
            _ => None,
        }
    }

    /// Maps a non-success HTTP status from the store or token endpoint.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ProbeError::Credential {
                details: format!("HTTP {}: {}", status, message),
            },
            _ => ProbeError::Server { status, message },
        }
    }

    pub fn credential<S: Into<String>>(details: S) -> Self {
        Self::Credential { details: details.into() }
    }

    pub fn network<S: Into<String>>(details: S) -> Self {
        Self::Network { details: details.into() }
    }

    pub fn not_found<C: Into<String>, D: Into<String>>(collection: C, document_id: D) -> Self {
        Self::NotFound {
            collection: collection.into(),
            document_id: document_id.into(),
        }
    }

    pub fn invalid_response<S: Into<String>>(details: S) -> Self {
        Self::InvalidResponse { details: details.into() }
    }

    pub fn configuration<S: Into<String>>(details: S) -> Self {
        Self::Configuration { details: details.into() }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProbeError::invalid_response(err.to_string())
        } else {
            ProbeError::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::invalid_response(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ProbeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ProbeError::credential(format!("failed to sign service account assertion: {}", err))
    }
}
