//! Console error types.

use gymdesk_access::AccessError;
use gymdesk_roster::{RosterError, StoreError};
use std::fmt;

/// Errors from starting the console or running one of its commands.
#[derive(Debug)]
pub enum ConsoleError {
    /// Configuration is missing or invalid.
    Config { details: String },
    /// A collaborator could not be constructed.
    Startup { details: String },
    /// Reading input or writing output failed.
    Io { details: String },
    /// The access controller rejected the command.
    Access(AccessError),
    /// A screen operation failed.
    Roster(RosterError),
    /// The caller may not run the command.
    Refused { reason: String },
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::Startup { details } => write!(f, "startup failed: {details}"),
            Self::Io { details } => write!(f, "console I/O failed: {details}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::Roster(err) => write!(f, "{err}"),
            Self::Refused { reason } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for ConsoleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Roster(err) => Some(err),
            Self::Config { .. } | Self::Startup { .. } | Self::Io { .. } | Self::Refused { .. } => {
                None
            }
        }
    }
}

impl From<AccessError> for ConsoleError {
    fn from(err: AccessError) -> Self {
        Self::Access(err)
    }
}

impl From<RosterError> for ConsoleError {
    fn from(err: RosterError) -> Self {
        Self::Roster(err)
    }
}

impl From<StoreError> for ConsoleError {
    fn from(err: StoreError) -> Self {
        Self::Roster(RosterError::Store(err))
    }
}
