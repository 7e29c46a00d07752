//! HTTP client for the hosted backend.

use crate::config::BackendConfig;
use crate::error::BackendError;
use gymdesk_access::SessionEvent;
use gymdesk_roster::ChangeHub;
use reqwest::{Method, RequestBuilder, Response};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

const SESSION_EVENT_CAPACITY: usize = 16;

pub(crate) struct Inner {
    pub(crate) http: reqwest::Client,
    pub(crate) config: BackendConfig,
    /// Access token of the signed-in principal.
    pub(crate) token: Mutex<Option<String>>,
    pub(crate) session_events: broadcast::Sender<SessionEvent>,
    pub(crate) changes: ChangeHub,
}

/// Client for the hosted auth and REST endpoints.
///
/// Implements the session provider, role directory, record stores and change
/// feed on top of one HTTP connection pool. Cloning shares the session.
#[derive(Clone)]
pub struct BackendClient {
    pub(crate) inner: Arc<Inner>,
}

impl BackendClient {
    /// Creates a client. No request is made until first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, Report<BackendError>> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| BackendError::Client {
                details: e.to_string(),
            })?;
        let (session_events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                token: Mutex::new(None),
                session_events,
                changes: ChangeHub::new(),
            }),
        })
    }

    /// Returns the configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }

    /// Returns true if a principal is signed in on this client.
    pub async fn has_session(&self) -> bool {
        self.inner.token.lock().await.is_some()
    }

    pub(crate) async fn access_token(&self) -> Option<String> {
        self.inner.token.lock().await.clone()
    }

    pub(crate) async fn set_access_token(&self, token: Option<String>) {
        *self.inner.token.lock().await = token;
    }

    pub(crate) fn publish_session(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.inner.session_events.send(event);
    }

    /// Builds a request to `/auth/v1/{path}`.
    pub(crate) fn auth(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/auth/v1/{path}", self.inner.config.url());
        self.inner
            .http
            .request(method, url)
            .header("apikey", self.inner.config.anon_key())
    }

    /// Builds a request to `/rest/v1/{table}`, authorised as the signed-in
    /// principal when there is one.
    pub(crate) async fn rest(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{table}", self.inner.config.url());
        let bearer = self
            .access_token()
            .await
            .unwrap_or_else(|| self.inner.config.anon_key().to_string());
        self.inner
            .http
            .request(method, url)
            .header("apikey", self.inner.config.anon_key())
            .bearer_auth(bearer)
    }

    /// Sends a request and decodes a JSON body.
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = send(request).await?;
        response.json().await.map_err(|e| BackendError::Decode {
            details: e.to_string(),
        })
    }

    /// Sends a request and ignores the body.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<(), BackendError> {
        send(request).await.map(|_| ())
    }
}

async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
    let response = request.send().await.map_err(|e| {
        warn!(error = %e, "backend request failed");
        BackendError::Transport {
            details: e.to_string(),
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    debug!(status = status.as_u16(), %message, "backend returned error");
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Pulls a readable message out of an error body.
///
/// The auth service and the REST layer use different field names.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map(str::to_string)
}
