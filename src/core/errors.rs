//! Error types for the assistant session layer.

use thiserror::Error;

/// Failure of a single backend request.
///
/// Stored inside a failed `AsyncOperation`, so it must stay cheap to clone
/// and comparable in tests.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the backend, if any.
        message: String,
    },

    /// The backend answered with a body that could not be decoded.
    #[error("malformed backend response: {0}")]
    Malformed(String),

    /// The backend reported a failure while producing its answer.
    #[error("backend failure: {0}")]
    Backend(String),

    /// The request was rejected before being sent.
    #[error("invalid request: {0}")]
    InvalidInput(String),
}

impl RequestError {
    /// Check if retrying the same request could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed(_) | Self::Backend(_) | Self::InvalidInput(_) => false,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Convenience result alias for backend requests.
pub type RequestResult<T> = Result<T, RequestError>;

/// Rejected user input. Handled locally and never shown to the user.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// The submission was empty or whitespace only.
    #[error("input is empty")]
    Empty,
}

/// Crate-level error for configuration, client construction and serving.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A backend request failed.
    #[error("request error: {0}")]
    Request(#[from] RequestError),
    /// HTTP client construction error.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Response pattern failed to compile.
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for crate-level operations.
pub type AssistantResult<T> = Result<T, AssistantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RequestError::Timeout.is_retryable());
        assert!(RequestError::Unreachable("refused".to_string()).is_retryable());
        assert!(
            RequestError::Status {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !RequestError::Status {
                status: 400,
                message: "Formula is required".to_string()
            }
            .is_retryable()
        );
        assert!(!RequestError::Malformed("eof".to_string()).is_retryable());
    }

    #[test]
    fn test_status_display_includes_message() {
        let err = RequestError::Status {
            status: 500,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "backend returned status 500: quota exceeded");
    }
}
