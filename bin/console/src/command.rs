//! Console line commands.
//!
//! Each input line is split into words (double quotes group words) and parsed
//! with clap, so `help` and `<command> --help` work as usual.

use clap::{Args, Parser, Subcommand};
use gymdesk_access::Role;
use gymdesk_core::{StudentId, UserId};
use gymdesk_roster::StudentDraft;

/// One console input line.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, name = "gymdesk>", disable_version_flag = true)]
pub struct ConsoleLine {
    #[command(subcommand)]
    pub command: ConsoleCommand,
}

/// Commands accepted at the console prompt.
#[derive(Debug, Subcommand)]
pub enum ConsoleCommand {
    /// Show the current access state
    Status,
    /// Sign in
    Login { email: String, password: String },
    /// Sign out
    Logout,
    /// Re-run the access check after a failure
    Retry,
    /// List students
    Students,
    /// Register a student
    AddStudent(StudentArgs),
    /// Edit a student; omitted fields keep their value
    EditStudent {
        id: StudentId,
        #[command(flatten)]
        fields: StudentArgs,
    },
    /// Delete a student
    DeleteStudent { id: StudentId },
    /// List staff accounts
    Users,
    /// Register a staff account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "instructor")]
        role: Role,
    },
    /// Edit a staff account; omitted fields keep their value
    EditUser {
        id: UserId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<Role>,
    },
    /// Delete a staff account row
    DeleteUser { id: UserId },
    /// Print the account list whenever it changes
    WatchUsers,
    /// Stop printing account changes
    UnwatchUsers,
    /// Email every student
    Notify {
        #[arg(long)]
        subject: String,
        /// Message body; `{name}` becomes the student's name
        #[arg(long)]
        body: String,
    },
    /// Leave the console
    #[command(alias = "exit")]
    Quit,
}

/// Student form fields.
#[derive(Debug, Clone, Default, Args)]
pub struct StudentArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub photo: Option<String>,
    #[arg(long)]
    pub modality: Option<String>,
    #[arg(long)]
    pub plan: Option<String>,
    /// DD-MM-YYYY
    #[arg(long)]
    pub start_date: Option<String>,
}

impl StudentArgs {
    /// Overlays the given fields onto `draft`.
    #[must_use]
    pub fn apply(self, mut draft: StudentDraft) -> StudentDraft {
        if let Some(name) = self.name {
            draft.name = name;
        }
        if let Some(email) = self.email {
            draft.email = email;
        }
        if let Some(phone) = self.phone {
            draft.phone = phone;
        }
        if let Some(photo) = self.photo {
            draft.photo = Some(photo);
        }
        if let Some(modality) = self.modality {
            draft.modality = modality;
        }
        if let Some(plan) = self.plan {
            draft.plan = plan;
        }
        if let Some(start_date) = self.start_date {
            draft.start_date = start_date;
        }
        draft
    }
}

/// Splits a line into words. Double quotes group words; there are no escapes.
#[must_use]
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        words.push(current);
    }
    words
}

/// Parses one input line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns clap's error, which also carries `--help` output.
pub fn parse_line(line: &str) -> Option<Result<ConsoleCommand, clap::Error>> {
    let words = split_words(line);
    if words.is_empty() {
        return None;
    }
    Some(ConsoleLine::try_parse_from(words).map(|parsed| parsed.command))
}
