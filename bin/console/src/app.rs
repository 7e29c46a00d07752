//! Console application wiring.
//!
//! Builds the access controller and screens on either the hosted backend or
//! the in-memory stores, then executes console commands against them.

use crate::command::ConsoleCommand;
use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::render;
use gymdesk_access::{
    AccessController, Credential, LocalSessions, RetryPolicy, Role, RoleDirectory,
    SessionProvider,
};
use gymdesk_backend::{BackendClient, HttpMailer};
use gymdesk_core::UserId;
use gymdesk_roster::{
    AccessContext, Account, AccountDraft, AccountScreen, AccountStore, ChangeFeed, InMemoryRoster,
    Mailer, Notice, RegistrationDraft, StudentDraft, StudentScreen, StudentStore,
    notify_students,
};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// What the console loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Print the text and read the next line.
    Continue(String),
    /// Leave the console.
    Quit,
}

/// The collaborators a console runs on.
struct Parts {
    sessions: Arc<dyn SessionProvider>,
    directory: Arc<dyn RoleDirectory>,
    students: Arc<dyn StudentStore>,
    accounts: Arc<dyn AccountStore>,
    feed: Arc<dyn ChangeFeed>,
}

/// A running console session.
pub struct App {
    controller: AccessController,
    students: StudentScreen,
    accounts: AccountScreen,
    student_store: Arc<dyn StudentStore>,
    mailer: Option<Arc<dyn Mailer>>,
    retry: RetryPolicy,
    follow_session_changes: bool,
    account_watch: Option<oneshot::Sender<()>>,
}

impl App {
    /// Builds the console from configuration. Nothing is resolved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend settings are missing or a client
    /// cannot be built.
    pub async fn build(config: &ConsoleConfig) -> gymdesk_core::Result<Self, ConsoleError> {
        let mailer = match &config.mail {
            Some(mail) => {
                let mailer = HttpMailer::new(
                    mail.relay_url.clone(),
                    mail.token.clone(),
                    Duration::from_secs(mail.timeout_seconds),
                )
                .map_err(|e| ConsoleError::Startup {
                    details: e.to_string(),
                })?;
                Some(Arc::new(mailer) as Arc<dyn Mailer>)
            }
            None => None,
        };

        let parts = if config.offline {
            offline_parts(config).await?
        } else {
            let backend = config.backend.clone().ok_or(ConsoleError::Config {
                details: "GYMDESK__BACKEND__URL and GYMDESK__BACKEND__ANON_KEY are required \
                          unless GYMDESK__OFFLINE=true"
                    .to_string(),
            })?;
            info!(url = backend.url(), "using hosted backend");
            let client = Arc::new(BackendClient::new(backend).map_err(|e| {
                ConsoleError::Startup {
                    details: e.to_string(),
                }
            })?);
            Parts {
                sessions: client.clone(),
                directory: client.clone(),
                students: client.clone(),
                accounts: client.clone(),
                feed: client,
            }
        };

        Ok(Self::assemble(parts, mailer, config))
    }

    fn assemble(parts: Parts, mailer: Option<Arc<dyn Mailer>>, config: &ConsoleConfig) -> Self {
        Self {
            controller: AccessController::new(parts.sessions.clone(), parts.directory),
            students: StudentScreen::new(parts.students.clone()),
            accounts: AccountScreen::new(parts.sessions, parts.accounts, parts.feed),
            student_store: parts.students,
            mailer,
            retry: config.access.retry_policy(),
            follow_session_changes: config.access.follow_session_changes,
            account_watch: None,
        }
    }

    /// Runs the first access check.
    pub async fn start(&self) -> String {
        if self.follow_session_changes && !self.controller.follow_session_changes().await {
            info!("session provider does not push changes");
        }
        match self.controller.init().await {
            Ok(snapshot) => render::presentation(&snapshot),
            Err(e) => format!("error: {e}"),
        }
    }

    /// Tears down background work.
    pub async fn shutdown(&mut self) {
        self.stop_watch();
        self.controller.dispose().await;
    }

    /// Executes one command.
    pub async fn execute(&mut self, command: ConsoleCommand) -> Step {
        if matches!(command, ConsoleCommand::Quit) {
            return Step::Quit;
        }
        let text = match self.run(command).await {
            Ok(text) => text,
            Err(err) => format!("error: {err}"),
        };
        Step::Continue(text)
    }

    /// Runs one command and returns its output, keeping failures typed.
    ///
    /// # Errors
    ///
    /// Returns the access or screen error that stopped the command, or
    /// `Refused`/`Config` when the console cannot run it for this caller.
    pub async fn perform(
        &mut self,
        command: ConsoleCommand,
    ) -> gymdesk_core::Result<String, ConsoleError> {
        Ok(self.run(command).await?)
    }

    async fn context(&self) -> Result<AccessContext, ConsoleError> {
        let snapshot = self.controller.snapshot().await;
        Ok(AccessContext::from_snapshot(&snapshot)?)
    }

    async fn run(&mut self, command: ConsoleCommand) -> Result<String, ConsoleError> {
        match command {
            ConsoleCommand::Status => {
                let snapshot = self.controller.snapshot().await;
                let mut text = render::presentation(&snapshot);
                if let Some(fault) = self.controller.diagnostics().await {
                    text.push_str(&format!("\nlast session check: {fault}"));
                }
                Ok(text)
            }
            ConsoleCommand::Login { email, password } => {
                let snapshot = self
                    .controller
                    .sign_in(&Credential::new(email, password))
                    .await?;
                Ok(render::presentation(&snapshot))
            }
            ConsoleCommand::Logout => {
                self.stop_watch();
                let snapshot = self.controller.sign_out().await?;
                Ok(render::presentation(&snapshot))
            }
            ConsoleCommand::Retry => {
                let snapshot = self.controller.retry_with(self.retry).await?;
                Ok(render::presentation(&snapshot))
            }
            ConsoleCommand::Students => {
                let ctx = self.context().await?;
                let students = self.students.list(&ctx).await?;
                Ok(render::students(&students, Local::now().date_naive()))
            }
            ConsoleCommand::AddStudent(args) => {
                let ctx = self.context().await?;
                let draft = args.apply(StudentDraft::default());
                let student = self.students.create(&ctx, &draft).await?;
                Ok(format!("student {} created", student.id))
            }
            ConsoleCommand::EditStudent { id, fields } => {
                let ctx = self.context().await?;
                let current = self.students.get(&ctx, id).await?;
                let draft = fields.apply(StudentDraft::from_student(&current));
                self.students.update(&ctx, id, &draft).await?;
                Ok(format!("student {id} updated"))
            }
            ConsoleCommand::DeleteStudent { id } => {
                let ctx = self.context().await?;
                self.students.delete(&ctx, id).await?;
                Ok(format!("student {id} deleted"))
            }
            ConsoleCommand::Users => {
                let ctx = self.context().await?;
                let accounts = self.accounts.list(&ctx).await?;
                Ok(render::accounts(&accounts))
            }
            ConsoleCommand::Register {
                name,
                email,
                password,
                phone,
                role,
            } => {
                let ctx = self.context().await?;
                let draft = RegistrationDraft {
                    name,
                    email,
                    phone,
                    password,
                    role,
                };
                let account = self.accounts.register(&ctx, &draft).await?;
                Ok(format!("user {} registered as {}", account.id, account.role))
            }
            ConsoleCommand::EditUser {
                id,
                name,
                email,
                role,
            } => {
                let ctx = self.context().await?;
                let current = self.accounts.get(&ctx, &id).await?;
                let mut draft = AccountDraft::from_account(&current);
                if let Some(name) = name {
                    draft.name = name;
                }
                if let Some(email) = email {
                    draft.email = email;
                }
                if role.is_some() {
                    draft.role = role;
                }
                self.accounts
                    .update(&ctx, &id, &draft)
                    .await?;
                Ok(format!("user {id} updated"))
            }
            ConsoleCommand::DeleteUser { id } => {
                let ctx = self.context().await?;
                self.accounts.delete(&ctx, &id).await?;
                Ok(format!("user {id} deleted"))
            }
            ConsoleCommand::WatchUsers => {
                let ctx = self.context().await?;
                let watch = self.accounts.watch(&ctx)?;
                self.stop_watch();
                let (stop, stopped) = oneshot::channel();
                tokio::spawn(print_account_changes(watch, stopped));
                self.account_watch = Some(stop);
                Ok("watching users".to_string())
            }
            ConsoleCommand::UnwatchUsers => Ok(if self.stop_watch() {
                "stopped watching users".to_string()
            } else {
                "not watching users".to_string()
            }),
            ConsoleCommand::Notify { subject, body } => {
                let ctx = self.context().await?;
                if ctx.role() != Some(Role::Administrator) {
                    return Err(ConsoleError::Refused {
                        reason: "only administrators can email students".to_string(),
                    });
                }
                let mailer = self
                    .mailer
                    .as_ref()
                    .ok_or_else(|| ConsoleError::Config {
                        details: "no mail relay configured (set GYMDESK__MAIL__RELAY_URL)"
                            .to_string(),
                    })?;
                let report = notify_students(
                    self.student_store.as_ref(),
                    mailer.as_ref(),
                    &Notice::new(subject, body),
                )
                .await?;
                Ok(render::report(&report))
            }
            ConsoleCommand::Quit => Ok(String::new()),
        }
    }

    fn stop_watch(&mut self) -> bool {
        match self.account_watch.take() {
            Some(stop) => {
                // The task may already have ended with the feed.
                let _ = stop.send(());
                true
            }
            None => false,
        }
    }
}

async fn print_account_changes(
    mut watch: gymdesk_roster::AccountWatch,
    mut stopped: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stopped => {
                watch.unsubscribe();
                return;
            }
            next = watch.next() => match next {
                Some((notice, Ok(accounts))) => {
                    println!("[users {:?}]\n{}", notice.kind, render::accounts(&accounts));
                }
                Some((_, Err(e))) => warn!(error = %e, "account refresh failed"),
                None => return,
            },
        }
    }
}

async fn offline_parts(config: &ConsoleConfig) -> gymdesk_core::Result<Parts, ConsoleError> {
    let sessions = Arc::new(LocalSessions::new());
    let roster = Arc::new(InMemoryRoster::new());

    let seed = &config.seed;
    let identity =
        sessions.insert_principal(UserId::generate(), &seed.admin_email, &seed.admin_password);
    roster
        .insert_account(Account {
            id: identity.id().clone(),
            name: "Administrator".to_string(),
            email: seed.admin_email.clone(),
            phone: None,
            role: Role::Administrator,
        })
        .await
        .map_err(|e| ConsoleError::Startup {
            details: e.to_string(),
        })?;
    info!(email = %seed.admin_email, "offline mode, seeded administrator");

    Ok(Parts {
        sessions,
        directory: roster.clone(),
        students: roster.clone(),
        accounts: roster.clone(),
        feed: roster,
    })
}
