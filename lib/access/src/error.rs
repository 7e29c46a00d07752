//! Error types for the access crate.
//!
//! - `SessionError`: failures reported by the session provider
//! - `LookupError`: failures reported by the role directory
//! - `AccessFault`: how a resolution failure is classified for the UI
//! - `AccessError`: errors returned by `AccessController` operations

use std::fmt;

/// Errors from session provider operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// There is no active session (no token, or the token was rejected).
    NoSession,
    /// The stored session has expired.
    Expired { reason: String },
    /// Sign-in was rejected.
    InvalidCredentials { reason: String },
    /// Sign-up was rejected by the auth service.
    Rejected { reason: String },
    /// The auth service could not be reached or failed.
    Provider { reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "no active session"),
            Self::Expired { reason } => write!(f, "{reason}"),
            Self::InvalidCredentials { reason } => write!(f, "{reason}"),
            Self::Rejected { reason } => write!(f, "{reason}"),
            Self::Provider { reason } => write!(f, "auth provider error: {reason}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors from role directory lookups.
///
/// A missing role row is not an error; directories return `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The query failed (network or backend fault).
    Query { reason: String },
    /// The row could not be decoded.
    Decode { reason: String },
}

impl LookupError {
    /// The underlying message, shown verbatim to operators.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Query { reason } | Self::Decode { reason } => reason,
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query { reason } => write!(f, "role query failed: {reason}"),
            Self::Decode { reason } => write!(f, "role row could not be decoded: {reason}"),
        }
    }
}

impl std::error::Error for LookupError {}

/// The resolution phase a fault happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Asking the session provider for the current identity.
    Identity,
    /// Asking the role directory for the identity's role.
    Role,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Role => write!(f, "role"),
        }
    }
}

/// Classification of a resolution fault.
///
/// Identity-phase faults fail open to a logged-out state; role-phase faults
/// fail closed to no privilege and block navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessFault {
    /// No active session. Routes to Login.
    ExpectedAbsence { detail: Option<String> },
    /// The role lookup failed. Recoverable via manual retry.
    TransientLookupFailure { message: String },
    /// Any other fault caught at the controller boundary.
    UnexpectedException { message: String },
}

impl AccessFault {
    /// Converts an unexpected fault into the kind its phase settles on.
    #[must_use]
    pub fn settle(self, phase: Phase) -> Self {
        match (self, phase) {
            (Self::UnexpectedException { message }, Phase::Identity) => Self::ExpectedAbsence {
                detail: Some(message),
            },
            (Self::UnexpectedException { message }, Phase::Role) => {
                Self::TransientLookupFailure { message }
            }
            (fault, _) => fault,
        }
    }

    /// Returns true if this fault must block navigation.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Self::ExpectedAbsence { .. })
    }
}

impl From<SessionError> for AccessFault {
    fn from(err: SessionError) -> Self {
        let detail = match err {
            SessionError::NoSession => None,
            other => Some(other.to_string()),
        };
        Self::ExpectedAbsence { detail }
    }
}

impl From<LookupError> for AccessFault {
    fn from(err: LookupError) -> Self {
        Self::TransientLookupFailure {
            message: err.message().to_string(),
        }
    }
}

impl fmt::Display for AccessFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpectedAbsence { detail: None } => write!(f, "no active session"),
            Self::ExpectedAbsence {
                detail: Some(detail),
            } => write!(f, "no active session ({detail})"),
            Self::TransientLookupFailure { message } => write!(f, "{message}"),
            Self::UnexpectedException { message } => write!(f, "unexpected fault: {message}"),
        }
    }
}

/// Errors returned by `AccessController` operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The controller was disposed.
    Disposed,
    /// A newer resolution replaced the one this call belonged to.
    Superseded { generation: u64 },
    /// A role lookup was requested for an identity that is not the
    /// confirmed current identity.
    IdentityNotConfirmed,
    /// The last resolution failed; only `retry` may leave that state.
    RetryRequired,
    /// Sign-in failed.
    SignIn { reason: String },
    /// Sign-out failed.
    SignOut { reason: String },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed => write!(f, "access controller has been disposed"),
            Self::Superseded { generation } => {
                write!(f, "resolution {generation} was superseded")
            }
            Self::IdentityNotConfirmed => {
                write!(f, "role lookup requires a confirmed identity")
            }
            Self::RetryRequired => {
                write!(f, "access resolution failed; retry before resolving again")
            }
            Self::SignIn { reason } => write!(f, "sign-in failed: {reason}"),
            Self::SignOut { reason } => write!(f, "sign-out failed: {reason}"),
        }
    }
}

impl std::error::Error for AccessError {}
