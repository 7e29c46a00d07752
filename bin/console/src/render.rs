//! Plain-text rendering for the console.

use chrono::NaiveDate;
use gymdesk_access::{AccessSnapshot, Presentation};
use gymdesk_roster::{Account, BroadcastReport, Student};
use std::fmt::Write;

/// Renders what the access layer says to show.
#[must_use]
pub fn presentation(snapshot: &AccessSnapshot) -> String {
    match snapshot.presentation() {
        Presentation::Loading => "loading...".to_string(),
        Presentation::RetryPanel { message } => {
            format!("access check failed: {message}\ntype `retry` to try again")
        }
        Presentation::Navigator { routes } => {
            let who = snapshot
                .identity()
                .map_or_else(|| "signed out".to_string(), |identity| identity.to_string());
            format!("{who} [{}]\nroutes: {routes}", snapshot.role())
        }
    }
}

/// Renders a student listing with each membership's status on `today`.
#[must_use]
pub fn students(students: &[Student], today: NaiveDate) -> String {
    if students.is_empty() {
        return "no students".to_string();
    }
    let mut out = String::new();
    for student in students {
        let fields = &student.fields;
        let _ = writeln!(
            out,
            "{:>5}  {:<24} {:<14} {:<10} {} to {}  {:<8}  {}",
            student.id,
            fields.name,
            fields.modality,
            fields.plan,
            fields.start_date.format("%d-%m-%Y"),
            student.end_date().format("%d-%m-%Y"),
            student.status(today),
            fields.email.as_deref().unwrap_or("-"),
        );
    }
    out.trim_end().to_string()
}

/// Renders an account listing.
#[must_use]
pub fn accounts(accounts: &[Account]) -> String {
    if accounts.is_empty() {
        return "no users".to_string();
    }
    let mut out = String::new();
    for account in accounts {
        let _ = writeln!(
            out,
            "{:<28} {:<24} {:<28} {}",
            account.id, account.name, account.email, account.role
        );
    }
    out.trim_end().to_string()
}

/// Renders a broadcast summary.
#[must_use]
pub fn report(report: &BroadcastReport) -> String {
    let mut out = format!(
        "sent {}, failed {}, skipped {} without email",
        report.sent,
        report.failed.len(),
        report.skipped
    );
    for recipient in &report.failed {
        let _ = write!(out, "\n  failed: {recipient}");
    }
    out
}
