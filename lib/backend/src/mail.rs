//! Mail delivery through an HTTP relay.

use crate::error::BackendError;
use async_trait::async_trait;
use gymdesk_roster::{Mail, Mailer, NotifyError};
use rootcause::prelude::Report;
use std::time::Duration;
use tracing::{debug, instrument};

/// Posts each mail as JSON (`to`, `subject`, `text`) to a relay endpoint.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpMailer {
    /// Creates a mailer for the relay at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, Report<BackendError>> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Client {
                details: e.to_string(),
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip_all, fields(to = %mail.to))]
    async fn send(&self, mail: &Mail) -> Result<(), NotifyError> {
        let mut request = self.http.post(&self.endpoint).json(mail);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| NotifyError::Transport {
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                recipient: mail.to.clone(),
                reason: format!("HTTP {status}: {}", body.trim()),
            });
        }
        debug!("relay accepted mail");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mail() -> Mail {
        Mail {
            to: "ana@mail.test".to_string(),
            subject: "Aviso".to_string(),
            text: "Oi Ana".to_string(),
        }
    }

    #[tokio::test]
    async fn posts_mail_to_relay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer relay-token"))
            .and(body_json(json!({
                "to": "ana@mail.test",
                "subject": "Aviso",
                "text": "Oi Ana",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(
            format!("{}/send", server.uri()),
            Some("relay-token".to_string()),
            Duration::from_secs(5),
        )
        .expect("mailer");
        mailer.send(&mail()).await.expect("sent");
    }

    #[tokio::test]
    async fn relay_refusal_names_recipient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("mailbox unavailable"))
            .mount(&server)
            .await;

        let mailer =
            HttpMailer::new(server.uri(), None, Duration::from_secs(5)).expect("mailer");
        let err = mailer.send(&mail()).await.expect_err("refused");
        assert!(matches!(
            err,
            NotifyError::Rejected { ref recipient, .. } if recipient == "ana@mail.test"
        ));
    }
}
