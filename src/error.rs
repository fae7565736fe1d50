//! Error types for the Dataverse client.

use uuid::Uuid;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between reading the settings file and the
/// platform's response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings file missing, key absent or connection string malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Token acquisition failed, or the platform rejected the token (HTTP 401).
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The platform answered with a non-success status.
    #[error("Request failed: {status} {reason}{}", message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Request {
        status: u16,
        reason: String,
        message: Option<String>,
    },

    /// The addressed record does not exist (HTTP 404).
    #[error("Not found: {entity}({id})")]
    NotFound { entity: String, id: Uuid },

    /// Rejected locally before any request was sent.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Returns true if the addressed record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication(_))
    }

    /// HTTP status carried by the error, if the platform produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Request { status, .. } => Some(*status),
            Error::NotFound { .. } => Some(404),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
