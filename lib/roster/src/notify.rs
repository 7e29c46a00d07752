//! Email broadcast to students.
//!
//! Sends one message per student that has an email address. A failed
//! delivery is logged and counted; the broadcast carries on with the next
//! student.

use crate::error::{NotifyError, StoreError};
use crate::store::StudentStore;
use crate::student::{Student, StudentFilter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// One outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// A message template. `{name}` in the body is replaced per student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub subject: String,
    pub body: String,
}

impl Notice {
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Renders the mail for one student, or `None` if they have no email.
    #[must_use]
    pub fn render(&self, student: &Student) -> Option<Mail> {
        let to = student.fields.email.as_deref()?.trim();
        if to.is_empty() {
            return None;
        }
        Some(Mail {
            to: to.to_string(),
            subject: self.subject.clone(),
            text: self.body.replace("{name}", &student.fields.name),
        })
    }
}

/// Delivers mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<(), NotifyError>;
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Messages accepted by the mailer.
    pub sent: usize,
    /// Recipients whose delivery failed.
    pub failed: Vec<String>,
    /// Students without an email address.
    pub skipped: usize,
}

/// Emails every student.
///
/// # Errors
///
/// Returns an error only if the student list cannot be loaded.
#[instrument(skip_all, fields(subject = %notice.subject))]
pub async fn notify_students(
    store: &dyn StudentStore,
    mailer: &dyn Mailer,
    notice: &Notice,
) -> Result<BroadcastReport, StoreError> {
    let students = store.list_students(&StudentFilter::All).await?;
    let mut report = BroadcastReport::default();

    if students.is_empty() {
        info!("no students to notify");
        return Ok(report);
    }

    for student in &students {
        let Some(mail) = notice.render(student) else {
            report.skipped += 1;
            continue;
        };
        match mailer.send(&mail).await {
            Ok(()) => {
                info!(to = %mail.to, "mail sent");
                report.sent += 1;
            }
            Err(e) => {
                warn!(to = %mail.to, error = %e, "mail failed");
                report.failed.push(mail.to);
            }
        }
    }

    info!(
        sent = report.sent,
        failed = report.failed.len(),
        skipped = report.skipped,
        "broadcast finished"
    );
    Ok(report)
}
