//! Error types for TinyCert operations

use thiserror::Error;

/// TinyCert client error
#[derive(Debug, Error)]
pub enum TinyCertError {
    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a status other than 200
    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },

    /// The response body was not valid JSON or did not have the expected shape
    #[error("Failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// `connect` was rejected or could not complete
    #[error("Authentication failed: {0}")]
    Authentication(#[source] Box<TinyCertError>),

    /// An authenticated operation was attempted before `connect`
    #[error("Session is not connected")]
    NotConnected,

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for TinyCertError {
    fn from(e: reqwest::Error) -> Self {
        TinyCertError::Transport(e.to_string())
    }
}

impl TinyCertError {
    /// HTTP status carried by a server error, looking through authentication failures
    pub fn status(&self) -> Option<u16> {
        match self {
            TinyCertError::Server { status, .. } => Some(*status),
            TinyCertError::Authentication(inner) => inner.status(),
            _ => None,
        }
    }
}

/// Result type for TinyCert operations
pub type Result<T> = std::result::Result<T, TinyCertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = TinyCertError::Server {
            status: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "Server error 403: forbidden");
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_authentication_wraps_cause() {
        let err = TinyCertError::Authentication(Box::new(TinyCertError::Server {
            status: 401,
            body: "bad credentials".to_string(),
        }));

        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("bad credentials"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_status_absent_for_local_errors() {
        assert_eq!(TinyCertError::NotConnected.status(), None);
        assert_eq!(TinyCertError::Transport("refused".into()).status(), None);
    }
}
