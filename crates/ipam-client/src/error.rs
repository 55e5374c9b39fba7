//! IPAM client errors

use thiserror::Error;

/// Errors that can occur when interacting with the IPAM API
#[derive(Debug, Error)]
pub enum IpamError {
    /// Connection, timeout or other transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered 404 for the requested resource
    #[error("Not found: {method} {path}: {message}")]
    NotFound {
        method: String,
        path: String,
        message: String,
    },

    /// The API answered with any other non-2xx status
    #[error("IPAM API error: {method} {path} ({status}): {message}")]
    Api {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    /// The response body did not match the expected shape
    #[error("error decoding response from {path}: {message}")]
    Decode { path: String, message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request or client configuration (e.g., missing base URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// HTTP status class of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 4xx: the service rejected the request
    ClientError,
    /// 5xx: the service failed to process the request
    ServerError,
}

impl StatusClass {
    /// Classify a numeric HTTP status; success and informational codes have no class.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400..=499 => Some(Self::ClientError),
            500..=599 => Some(Self::ServerError),
            _ => None,
        }
    }
}

impl IpamError {
    /// Build the error for a non-2xx response from its status and raw body.
    pub fn from_response(method: &str, path: &str, status: u16, body: &str) -> Self {
        let message = extract_error_message(status, body);
        if status == 404 {
            Self::NotFound {
                method: method.to_string(),
                path: path.to_string(),
                message,
            }
        } else {
            Self::Api {
                method: method.to_string(),
                path: path.to_string(),
                status,
                message,
            }
        }
    }

    /// HTTP status of the failed response, if the request got that far.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Status class of the failure (4xx vs 5xx).
    #[must_use]
    pub fn status_class(&self) -> Option<StatusClass> {
        self.status().and_then(StatusClass::from_status)
    }

    /// Human-readable message reported by the service, when there is one.
    #[must_use]
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::NotFound { message, .. } | Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    /// True for not-found responses.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for failures that never reached a definitive answer from the service:
    /// connection errors, timeouts and 5xx responses.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Http(e) => e.status().is_none_or(|s| s.is_server_error()),
            _ => self.status_class() == Some(StatusClass::ServerError),
        }
    }
}

/// Error body returned by the IPAM API
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: String,
}

/// Pull the message out of an `{"error": "..."}` body, falling back to the raw
/// body and then to the status reason phrase.
pub(crate) fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if !parsed.error.trim().is_empty() {
            return parsed.error;
        }
    }
    let raw = body.trim();
    if !raw.is_empty() {
        return raw.to_string();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("request failed")
        .to_string()
}
