//! Role types for gym staff access control.
//!
//! A principal's role lives on its account row and is looked up after the
//! identity is confirmed. Roles are never inferred.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access level attached to a staff account.
///
/// Stored in the backend under the names `master` and `professor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Full access: staff management and every student record.
    #[serde(rename = "master", alias = "administrator")]
    Administrator,
    /// Registers students and sees only the students assigned to them.
    #[serde(rename = "professor", alias = "instructor")]
    Instructor,
}

impl Role {
    /// Returns true if this role has administrator privileges.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Administrator)
    }

    /// Returns the name the backend stores for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "master",
            Self::Instructor => "professor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Administrator => write!(f, "administrator"),
            Self::Instructor => write!(f, "instructor"),
        }
    }
}

/// Error returned for a role name outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master" | "administrator" | "admin" => Ok(Self::Administrator),
            "professor" | "instructor" => Ok(Self::Instructor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Progress of the role lookup for the current identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "role", rename_all = "snake_case")]
pub enum RoleLookup {
    /// The lookup has not completed.
    #[default]
    Unresolved,
    /// The principal has no role record.
    Absent,
    /// The lookup found a role.
    Resolved(Role),
}

impl RoleLookup {
    /// Returns the resolved role, if any.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Resolved(role) => Some(*role),
            Self::Unresolved | Self::Absent => None,
        }
    }

    /// Returns true once the lookup has completed, with or without a role.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

impl From<Option<Role>> for RoleLookup {
    fn from(role: Option<Role>) -> Self {
        role.map_or(Self::Absent, Self::Resolved)
    }
}

impl fmt::Display for RoleLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => write!(f, "unresolved"),
            Self::Absent => write!(f, "none"),
            Self::Resolved(role) => write!(f, "{role}"),
        }
    }
}
