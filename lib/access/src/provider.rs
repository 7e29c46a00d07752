//! Collaborators the access controller consumes.
//!
//! Both are asynchronous and fallible. Implementations live in other crates
//! (the hosted backend adapter, the in-memory roster) or in `memory`.

use crate::error::{LookupError, SessionError};
use crate::identity::{Credential, Identity, Registration};
use crate::role::Role;
use async_trait::async_trait;
use gymdesk_core::UserId;
use tokio::sync::broadcast;

/// A change in the provider's session that happened outside the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A principal signed in.
    SignedIn(Identity),
    /// The session ended.
    SignedOut,
}

/// Supplies the current authenticated identity.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the current identity, or `None` with no active session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is expired or the provider fails.
    async fn current_identity(&self) -> Result<Option<Identity>, SessionError>;

    /// Signs in with email and password.
    async fn sign_in(&self, credential: &Credential) -> Result<Identity, SessionError>;

    /// Registers a new principal and returns its identity.
    async fn sign_up(&self, registration: &Registration) -> Result<Identity, SessionError>;

    /// Ends the current session.
    async fn sign_out(&self) -> Result<(), SessionError>;

    /// Returns a stream of session changes, if the provider can push them.
    fn session_events(&self) -> Option<broadcast::Receiver<SessionEvent>> {
        None
    }
}

/// Looks up the role attached to a principal.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Returns the principal's role, or `None` when it has no role row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn role_of(&self, id: &UserId) -> Result<Option<Role>, LookupError>;
}
