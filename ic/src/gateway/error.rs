//! Gateway error types

use thiserror::Error;

/// Errors from a remote service call
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// HTTP status, when the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Api { status, .. } => Some(*status),
            ServiceError::Network(e) => e.status().map(|s| s.as_u16()),
            ServiceError::InvalidResponse(_) | ServiceError::Json(_) => None,
        }
    }

    /// Human-readable message shown to the user
    ///
    /// For API errors this is the service's own `detail` text, verbatim.
    pub fn message(&self) -> String {
        match self {
            ServiceError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Api { status, .. } => is_retryable_status(*status),
            ServiceError::Network(_) => true,
            ServiceError::InvalidResponse(_) => false,
            ServiceError::Json(_) => false,
        }
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Pull the human-readable message out of an error body
///
/// FastAPI answers with `{"detail": ...}`; other services use `message`.
/// Falls back to the raw body, then to a generic status line.
pub(crate) fn extract_detail(status: u16, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message"] {
            match map.get(key) {
                Some(serde_json::Value::String(s)) if !s.trim().is_empty() => return s.clone(),
                Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
        return format!("Service returned HTTP {}", status);
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("Service returned HTTP {}", status)
    } else {
        trimmed.to_string()
    }
}
