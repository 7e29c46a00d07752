//! Error types for the roster crate.
//!
//! - `StoreError`: failures reported by a record store
//! - `RosterError`: failures of a screen operation (wraps `StoreError`)
//! - `NotifyError`: failures delivering a single email

use gymdesk_access::Route;
use std::fmt;

/// Errors from record store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or failed.
    Unavailable { reason: String },
    /// The record does not exist.
    NotFound { entity: &'static str, id: String },
    /// The store rejected the write.
    Rejected { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "record store unavailable: {reason}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Rejected { reason } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from screen operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// The caller is not signed in, or access is still resolving.
    NotSignedIn,
    /// The caller's route set does not include the screen.
    AccessDenied { route: Route },
    /// A required field is empty.
    MissingField { field: &'static str },
    /// A start date could not be parsed.
    InvalidDate { value: String },
    /// The plan is not one the gym sells.
    InvalidPlan { value: String },
    /// Registering the principal with the auth service failed.
    SignUp { reason: String },
    /// The record store failed.
    Store(StoreError),
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSignedIn => write!(f, "not signed in"),
            Self::AccessDenied { route } => write!(f, "access denied to {route}"),
            Self::MissingField { field } => write!(f, "required field is empty: {field}"),
            Self::InvalidDate { value } => {
                write!(f, "invalid date '{value}', expected DD-MM-YYYY")
            }
            Self::InvalidPlan { value } => {
                write!(f, "unknown plan '{value}', expected Mensal, Trimestral or Anual")
            }
            Self::SignUp { reason } => write!(f, "sign-up failed: {reason}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RosterError {}

impl From<StoreError> for RosterError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Errors delivering an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The mail relay refused the message.
    Rejected { recipient: String, reason: String },
    /// The mail relay could not be reached.
    Transport { reason: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { recipient, reason } => {
                write!(f, "mail to {recipient} rejected: {reason}")
            }
            Self::Transport { reason } => write!(f, "mail transport failed: {reason}"),
        }
    }
}

impl std::error::Error for NotifyError {}
