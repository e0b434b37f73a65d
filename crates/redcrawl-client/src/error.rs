//! Client error types.

use reqwest::StatusCode;
use thiserror::Error;

use crate::forms::ValidationErrors;

/// Errors surfaced to callers of the Redcrawl client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or transport failure (connection refused, reset, TLS...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend rejected the credentials (401), after any refresh attempt.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested resource does not exist (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Form input rejected before reaching the network.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Build an error from a non-success response.
    ///
    /// The backend reports failures as `{"detail": ...}` where `detail` is
    /// either a string or a list of validation entries; anything else falls
    /// back to the raw body.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let message = detail_message(body).unwrap_or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                text
            }
        });

        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            _ => ClientError::Status {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// True for a 401 that survived the refresh attempt.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }
}

fn detail_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .filter_map(|entry| {
                    let msg = entry.get("msg")?.as_str()?;
                    let loc = entry
                        .get("loc")
                        .and_then(|l| l.as_array())
                        .map(|l| {
                            l.iter()
                                .filter_map(|p| match p {
                                    serde_json::Value::String(s) => Some(s.clone()),
                                    serde_json::Value::Number(n) => Some(n.to_string()),
                                    _ => None,
                                })
                                .collect::<Vec<_>>()
                                .join(".")
                        })
                        .unwrap_or_default();
                    Some(if loc.is_empty() {
                        msg.to_string()
                    } else {
                        format!("{}: {}", loc, msg)
                    })
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

impl From<ValidationErrors> for ClientError {
    fn from(e: ValidationErrors) -> Self {
        ClientError::Validation(e)
    }
}
