//! Screen services.
//!
//! Each operation takes the caller's `AccessContext` and checks the route it
//! belongs to before touching the store. The context is a read-only copy of a
//! settled access snapshot; screens never resolve access themselves.

use crate::account::{Account, AccountDraft, RegistrationDraft};
use crate::error::{RosterError, StoreError};
use crate::feed::{ChangeFeed, ChangeNotice, Subscription, Table};
use crate::store::{AccountStore, StudentStore};
use crate::student::{Student, StudentDraft, StudentFilter};
use gymdesk_access::{
    AccessSnapshot, Identity, Registration, ResolutionState, Role, RoleLookup, Route, RouteSet,
    SessionProvider,
};
use gymdesk_core::{StudentId, UserId};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What a screen knows about its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    identity: Identity,
    role: RoleLookup,
    routes: RouteSet,
}

impl AccessContext {
    /// Captures the caller from a settled snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NotSignedIn` if the snapshot is not ready or has no identity.
    pub fn from_snapshot(snapshot: &AccessSnapshot) -> Result<Self, RosterError> {
        let identity = match (snapshot.resolution(), snapshot.identity()) {
            (ResolutionState::Ready, Some(identity)) => identity.clone(),
            _ => return Err(RosterError::NotSignedIn),
        };
        Ok(Self {
            identity,
            role: snapshot.role(),
            routes: snapshot.routes().clone(),
        })
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role.role()
    }

    #[must_use]
    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }

    /// Fails unless the caller may reach `route`.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` naming the route.
    pub fn require(&self, route: Route) -> Result<(), RosterError> {
        if self.routes.contains(route) {
            Ok(())
        } else {
            debug!(user_id = %self.identity.id(), %route, "route denied");
            Err(RosterError::AccessDenied { route })
        }
    }
}

/// Dashboard and student form operations.
#[derive(Clone)]
pub struct StudentScreen {
    store: Arc<dyn StudentStore>,
}

impl StudentScreen {
    #[must_use]
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self { store }
    }

    /// Lists the students the caller may see, newest first.
    ///
    /// Administrators see everyone and instructors see their own students.
    /// A caller without a role gets an empty list.
    #[instrument(skip_all, fields(user_id = %ctx.identity().id()))]
    pub async fn list(&self, ctx: &AccessContext) -> Result<Vec<Student>, RosterError> {
        ctx.require(Route::Dashboard)?;
        let filter = match ctx.role() {
            Some(Role::Administrator) => StudentFilter::All,
            Some(Role::Instructor) => StudentFilter::Instructor(ctx.identity().id().clone()),
            None => return Ok(Vec::new()),
        };
        let students = self.store.list_students(&filter).await?;
        debug!(count = students.len(), "students listed");
        Ok(students)
    }

    /// Loads one student for the edit form.
    pub async fn get(&self, ctx: &AccessContext, id: StudentId) -> Result<Student, RosterError> {
        ctx.require(Route::EditStudent)?;
        Ok(self.store.get_student(id).await?)
    }

    /// Registers a new student. Instructors become the student's instructor.
    #[instrument(skip_all, fields(user_id = %ctx.identity().id()))]
    pub async fn create(
        &self,
        ctx: &AccessContext,
        draft: &StudentDraft,
    ) -> Result<Student, RosterError> {
        ctx.require(Route::CreateStudent)?;
        let fields = draft.validate()?;
        let instructor_id = match ctx.role() {
            Some(Role::Instructor) => Some(ctx.identity().id().clone()),
            _ => None,
        };
        let student = self.store.insert_student(fields, instructor_id).await?;
        info!(student_id = %student.id, "student created");
        Ok(student)
    }

    /// Saves edits to a student.
    #[instrument(skip_all, fields(user_id = %ctx.identity().id(), student_id = %id))]
    pub async fn update(
        &self,
        ctx: &AccessContext,
        id: StudentId,
        draft: &StudentDraft,
    ) -> Result<Student, RosterError> {
        ctx.require(Route::EditStudent)?;
        let fields = draft.validate()?;
        let student = self.store.update_student(id, fields).await?;
        info!("student updated");
        Ok(student)
    }

    /// Removes a student.
    #[instrument(skip_all, fields(user_id = %ctx.identity().id(), student_id = %id))]
    pub async fn delete(&self, ctx: &AccessContext, id: StudentId) -> Result<(), RosterError> {
        ctx.require(Route::EditStudent)?;
        self.store.delete_student(id).await?;
        info!("student deleted");
        Ok(())
    }
}

/// Staff account operations.
#[derive(Clone)]
pub struct AccountScreen {
    sessions: Arc<dyn SessionProvider>,
    store: Arc<dyn AccountStore>,
    feed: Arc<dyn ChangeFeed>,
}

impl AccountScreen {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        store: Arc<dyn AccountStore>,
        feed: Arc<dyn ChangeFeed>,
    ) -> Self {
        Self {
            sessions,
            store,
            feed,
        }
    }

    /// Registers a principal with the auth service and stores its account row.
    #[instrument(skip_all, fields(user_id = %ctx.identity().id(), role = %draft.role))]
    pub async fn register(
        &self,
        ctx: &AccessContext,
        draft: &RegistrationDraft,
    ) -> Result<Account, RosterError> {
        ctx.require(Route::RegisterUser)?;
        draft.validate()?;

        let registration = Registration::new(draft.email.trim(), draft.password.as_str());
        let identity = self
            .sessions
            .sign_up(&registration)
            .await
            .map_err(|e| RosterError::SignUp {
                reason: e.to_string(),
            })?;

        let phone = draft.phone.trim();
        let account = Account {
            id: identity.id().clone(),
            name: draft.name.trim().to_string(),
            email: draft.email.trim().to_string(),
            phone: (!phone.is_empty()).then(|| phone.to_string()),
            role: draft.role,
        };
        let account = self.store.insert_account(account).await?;
        info!(account_id = %account.id, "account registered");
        Ok(account)
    }

    /// Lists staff accounts, newest first.
    pub async fn list(&self, ctx: &AccessContext) -> Result<Vec<Account>, RosterError> {
        ctx.require(Route::ListUsers)?;
        Ok(self.store.list_accounts().await?)
    }

    /// Loads one account for the edit form.
    pub async fn get(&self, ctx: &AccessContext, id: &UserId) -> Result<Account, RosterError> {
        ctx.require(Route::EditUser)?;
        Ok(self.store.get_account(id).await?)
    }

    /// Saves edits to an account.
    #[instrument(skip_all, fields(user_id = %ctx.identity().id(), account_id = %id))]
    pub async fn update(
        &self,
        ctx: &AccessContext,
        id: &UserId,
        draft: &AccountDraft,
    ) -> Result<Account, RosterError> {
        ctx.require(Route::EditUser)?;
        let changes = draft.validate()?;
        let account = self.store.update_account(id, changes).await?;
        info!("account updated");
        Ok(account)
    }

    /// Removes an account row.
    #[instrument(skip_all, fields(user_id = %ctx.identity().id(), account_id = %id))]
    pub async fn delete(&self, ctx: &AccessContext, id: &UserId) -> Result<(), RosterError> {
        ctx.require(Route::ListUsers)?;
        self.store.delete_account(id).await?;
        info!("account deleted");
        Ok(())
    }

    /// Opens a live account listing that refetches on every change.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` unless the caller may reach `ListUsers`.
    pub fn watch(&self, ctx: &AccessContext) -> Result<AccountWatch, RosterError> {
        ctx.require(Route::ListUsers)?;
        Ok(AccountWatch {
            store: Arc::clone(&self.store),
            subscription: self.feed.subscribe(Table::Accounts),
        })
    }
}

/// A live account listing. Ends when dropped or unsubscribed.
pub struct AccountWatch {
    store: Arc<dyn AccountStore>,
    subscription: Subscription,
}

impl std::fmt::Debug for AccountWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountWatch")
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

impl AccountWatch {
    /// Waits for the next change and returns the refetched listing.
    ///
    /// Returns `None` once the change feed closes.
    pub async fn next(&mut self) -> Option<(ChangeNotice, Result<Vec<Account>, StoreError>)> {
        let notice = self.subscription.next().await?;
        debug!(kind = ?notice.kind, "accounts changed, refetching");
        Some((notice, self.store.list_accounts().await))
    }

    /// Stops watching.
    pub fn unsubscribe(self) {
        self.subscription.unsubscribe();
    }
}
