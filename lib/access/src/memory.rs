//! In-process session provider.
//!
//! Keeps principals in memory and pushes a `SessionEvent` on every sign-in
//! and sign-out. Used for offline runs and tests.

use crate::error::SessionError;
use crate::identity::{Credential, Identity, Registration};
use crate::provider::{SessionEvent, SessionProvider};
use async_trait::async_trait;
use gymdesk_core::UserId;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Default)]
struct LocalState {
    principals: HashMap<String, (String, Identity)>,
    current: Option<Identity>,
}

/// Session provider backed by process memory.
#[derive(Debug)]
pub struct LocalSessions {
    state: Mutex<LocalState>,
    events: broadcast::Sender<SessionEvent>,
}

impl LocalSessions {
    /// Creates a provider with no principals.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(LocalState::default()),
            events,
        }
    }

    /// Adds a principal with a known id. Returns its identity.
    pub fn insert_principal(&self, id: UserId, email: &str, password: &str) -> Identity {
        let identity = Identity::with_email(id, email);
        let mut state = self.lock();
        state.principals.insert(
            email.to_ascii_lowercase(),
            (password.to_string(), identity.clone()),
        );
        identity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocalState> {
        // The state is plain data; a poisoned lock still holds a usable value.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for LocalSessions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for LocalSessions {
    async fn current_identity(&self) -> Result<Option<Identity>, SessionError> {
        Ok(self.lock().current.clone())
    }

    async fn sign_in(&self, credential: &Credential) -> Result<Identity, SessionError> {
        let identity = {
            let mut state = self.lock();
            let identity = match state.principals.get(&credential.email().to_ascii_lowercase()) {
                Some((password, identity)) if password == credential.password() => {
                    identity.clone()
                }
                _ => {
                    return Err(SessionError::InvalidCredentials {
                        reason: "Invalid login credentials".to_string(),
                    });
                }
            };
            state.current = Some(identity.clone());
            identity
        };
        debug!(user_id = %identity.id(), "signed in");
        self.publish(SessionEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, registration: &Registration) -> Result<Identity, SessionError> {
        let key = registration.email().to_ascii_lowercase();
        if self.lock().principals.contains_key(&key) {
            return Err(SessionError::Rejected {
                reason: "User already registered".to_string(),
            });
        }
        if registration.password().len() < 6 {
            return Err(SessionError::Rejected {
                reason: "Password should be at least 6 characters".to_string(),
            });
        }
        let identity = self.insert_principal(
            UserId::generate(),
            registration.email(),
            registration.password(),
        );
        debug!(user_id = %identity.id(), "principal registered");
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        let was_signed_in = self.lock().current.take().is_some();
        if was_signed_in {
            self.publish(SessionEvent::SignedOut);
        }
        Ok(())
    }

    fn session_events(&self) -> Option<broadcast::Receiver<SessionEvent>> {
        Some(self.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_sets_current_identity() {
        let sessions = LocalSessions::new();
        let identity = sessions.insert_principal(UserId::from("u-1"), "ana@gym.test", "secret1");

        assert_eq!(sessions.current_identity().await, Ok(None));
        let signed_in = sessions
            .sign_in(&Credential::new("ANA@gym.test", "secret1"))
            .await
            .expect("sign in");
        assert_eq!(signed_in, identity);
        assert_eq!(sessions.current_identity().await, Ok(Some(identity)));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let sessions = LocalSessions::new();
        sessions.insert_principal(UserId::from("u-1"), "ana@gym.test", "secret1");

        let err = sessions
            .sign_in(&Credential::new("ana@gym.test", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidCredentials { .. }));
    }

    #[tokio::test]
    async fn sign_up_rejects_duplicates_and_short_passwords() {
        let sessions = LocalSessions::new();
        sessions
            .sign_up(&Credential::new("bia@gym.test", "secret1"))
            .await
            .expect("sign up");

        let duplicate = sessions
            .sign_up(&Credential::new("bia@gym.test", "secret2"))
            .await
            .unwrap_err();
        assert!(matches!(duplicate, SessionError::Rejected { .. }));

        let short = sessions
            .sign_up(&Credential::new("caio@gym.test", "123"))
            .await
            .unwrap_err();
        assert!(matches!(short, SessionError::Rejected { .. }));
    }

    #[tokio::test]
    async fn session_changes_are_pushed() {
        let sessions = LocalSessions::new();
        let identity = sessions.insert_principal(UserId::from("u-1"), "ana@gym.test", "secret1");
        let mut events = sessions.session_events().expect("event stream");

        sessions
            .sign_in(&Credential::new("ana@gym.test", "secret1"))
            .await
            .expect("sign in");
        sessions.sign_out().await.expect("sign out");

        assert_eq!(events.recv().await, Ok(SessionEvent::SignedIn(identity)));
        assert_eq!(events.recv().await, Ok(SessionEvent::SignedOut));
    }
}
