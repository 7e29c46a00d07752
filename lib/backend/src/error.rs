//! Backend adapter error types.

use std::fmt;

/// Errors talking to the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The HTTP client could not be built.
    Client {
        /// Error details.
        details: String,
    },
    /// The request never got a response.
    Transport {
        /// Error details.
        details: String,
    },
    /// The backend answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },
    /// The response body was not what we expected.
    Decode {
        /// Error details.
        details: String,
    },
}

impl BackendError {
    /// Returns the HTTP status, if the backend answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for 401 and 403 answers.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Returns true for 4xx answers.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }

    /// Returns the message a user should see.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Client { details } | Self::Transport { details } | Self::Decode { details } => {
                details
            }
            Self::Status { message, .. } => message,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client { details } => write!(f, "failed to build HTTP client: {details}"),
            Self::Transport { details } => write!(f, "backend unreachable: {details}"),
            Self::Status { status, message } => write!(f, "backend returned {status}: {message}"),
            Self::Decode { details } => write!(f, "unexpected backend response: {details}"),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let err = BackendError::Status {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert!(err.is_unauthorized());
        assert!(err.is_client_error());

        let err = BackendError::Status {
            status: 503,
            message: "down".to_string(),
        };
        assert!(!err.is_unauthorized());
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "backend returned 503: down");
    }
}
