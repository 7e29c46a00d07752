//! Session provider over the hosted auth endpoints.

use crate::client::BackendClient;
use crate::error::BackendError;
use async_trait::async_trait;
use gymdesk_access::{Credential, Identity, Registration, SessionError, SessionEvent, SessionProvider};
use gymdesk_core::UserId;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl AuthUser {
    fn into_identity(self) -> Identity {
        let id = UserId::new(self.id);
        match self.email {
            Some(email) => Identity::with_email(id, email),
            None => Identity::new(id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    user: AuthUser,
}

/// Sign-up answers with a session when confirmation is off, and with the
/// bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpReply {
    WithSession { user: AuthUser },
    User(AuthUser),
}

impl SignUpReply {
    fn into_user(self) -> AuthUser {
        match self {
            Self::WithSession { user } | Self::User(user) => user,
        }
    }
}

fn provider_error(err: &BackendError) -> SessionError {
    SessionError::Provider {
        reason: err.to_string(),
    }
}

#[async_trait]
impl SessionProvider for BackendClient {
    #[instrument(skip(self))]
    async fn current_identity(&self) -> Result<Option<Identity>, SessionError> {
        let Some(token) = self.access_token().await else {
            debug!("no stored session");
            return Ok(None);
        };

        let request = self.auth(Method::GET, "user").bearer_auth(token);
        match self.fetch::<AuthUser>(request).await {
            Ok(user) => Ok(Some(user.into_identity())),
            Err(err) if err.is_unauthorized() => {
                info!(error = %err, "stored session rejected, treating as signed out");
                self.set_access_token(None).await;
                Ok(None)
            }
            Err(err) => Err(provider_error(&err)),
        }
    }

    #[instrument(skip_all, fields(email = %credential.email()))]
    async fn sign_in(&self, credential: &Credential) -> Result<Identity, SessionError> {
        let request = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&json!({
                "email": credential.email(),
                "password": credential.password(),
            }));

        let grant = match self.fetch::<TokenGrant>(request).await {
            Ok(grant) => grant,
            Err(err) if err.is_client_error() => {
                return Err(SessionError::InvalidCredentials {
                    reason: err.message().to_string(),
                });
            }
            Err(err) => return Err(provider_error(&err)),
        };

        self.set_access_token(Some(grant.access_token)).await;
        let identity = grant.user.into_identity();
        info!(user_id = %identity.id(), "signed in");
        self.publish_session(SessionEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    /// Registers a principal. The caller's own session is left in place.
    #[instrument(skip_all, fields(email = %registration.email()))]
    async fn sign_up(&self, registration: &Registration) -> Result<Identity, SessionError> {
        let request = self.auth(Method::POST, "signup").json(&json!({
            "email": registration.email(),
            "password": registration.password(),
        }));

        match self.fetch::<SignUpReply>(request).await {
            Ok(reply) => {
                let identity = reply.into_user().into_identity();
                info!(user_id = %identity.id(), "principal registered");
                Ok(identity)
            }
            Err(err) if err.is_client_error() => Err(SessionError::Rejected {
                reason: err.message().to_string(),
            }),
            Err(err) => Err(provider_error(&err)),
        }
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), SessionError> {
        let Some(token) = self.access_token().await else {
            return Ok(());
        };
        self.set_access_token(None).await;
        self.publish_session(SessionEvent::SignedOut);

        // The local session is gone either way; a failed revoke only leaves
        // the token to expire on its own.
        let request = self.auth(Method::POST, "logout").bearer_auth(token);
        if let Err(err) = self.execute(request).await {
            warn!(error = %err, "token revocation failed");
        }
        info!("signed out");
        Ok(())
    }

    fn session_events(&self) -> Option<broadcast::Receiver<SessionEvent>> {
        Some(self.inner.session_events.subscribe())
    }
}
