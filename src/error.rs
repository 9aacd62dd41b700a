use serde::Serialize;
use std::io;

/// Error type for every stage of a relayed build
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid build event: {0}")]
    Validation(String),

    #[error("Build detail fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("Artifact transfer failed: {0}")]
    Transfer(String),

    #[error("Channel '{channel}' rejected upload with status {status}: {body}")]
    DistributionRejected {
        channel: String,
        status: u16,
        body: String,
    },

    #[error("Share link creation failed: {0}")]
    ShareLink(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

impl RelayError {
    /// Shape this error the way it is reported back to the webhook caller.
    pub fn to_acknowledgment(&self) -> Acknowledgment {
        let message = match self {
            RelayError::Validation(reason) => reason.clone(),
            RelayError::UpstreamFetch(_) => {
                "Problem getting build details from the CI service.".to_string()
            }
            RelayError::ShareLink(_) => "Problem creating share link at the CI service.".to_string(),
            other => other.to_string(),
        };
        let error_dump = match self {
            RelayError::Validation(_) => None,
            other => Some(other.to_string()),
        };
        Acknowledgment {
            error: true,
            message,
            error_dump,
        }
    }
}

/// Body returned on `POST /build`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Acknowledgment {
    pub error: bool,
    pub message: String,
    #[serde(rename = "errorDump", skip_serializing_if = "Option::is_none")]
    pub error_dump: Option<String>,
}

impl Acknowledgment {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            error_dump: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            error_dump: None,
        }
    }
}

/// Helper type for Results that use RelayError
pub type Result<T> = std::result::Result<T, RelayError>;
