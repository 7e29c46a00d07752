//! The access controller.
//!
//! Owns `(identity, role, resolution)` and publishes an `AccessSnapshot` on
//! every change. Identity is always resolved before role, and every awaited
//! result is applied only if its generation is still current and the
//! controller has not been disposed.
//!
//! Identity-phase faults fail open to a logged-out state. Role-phase faults
//! fail closed: the resolution moves to `Failed` with the literal message and
//! navigation stays blocked until an operator retries.

use crate::error::{AccessError, AccessFault, Phase};
use crate::identity::{Credential, Identity};
use crate::provider::{RoleDirectory, SessionEvent, SessionProvider};
use crate::retry::RetryPolicy;
use crate::role::RoleLookup;
use crate::state::{AccessSnapshot, ResolutionState};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

struct ControllerState {
    generation: u64,
    disposed: bool,
    identity: Option<Identity>,
    role: RoleLookup,
    resolution: ResolutionState,
    diagnostics: Option<AccessFault>,
    follower: Option<JoinHandle<()>>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            generation: 0,
            disposed: false,
            identity: None,
            role: RoleLookup::Unresolved,
            resolution: ResolutionState::Loading,
            diagnostics: None,
            follower: None,
        }
    }

    fn snapshot(&self) -> AccessSnapshot {
        AccessSnapshot::new(
            self.generation,
            self.identity.clone(),
            self.role,
            self.resolution.clone(),
        )
    }

    fn ensure_live(&self) -> Result<(), AccessError> {
        if self.disposed {
            Err(AccessError::Disposed)
        } else {
            Ok(())
        }
    }

    fn ensure_current(&self, generation: u64) -> Result<(), AccessError> {
        self.ensure_live()?;
        if self.generation != generation {
            return Err(AccessError::Superseded { generation });
        }
        Ok(())
    }

    /// A failed resolution stays failed until `retry` starts a new one.
    fn ensure_not_failed(&self) -> Result<(), AccessError> {
        if self.resolution.is_failed() {
            return Err(AccessError::RetryRequired);
        }
        Ok(())
    }
}

struct Inner {
    sessions: Arc<dyn SessionProvider>,
    directory: Arc<dyn RoleDirectory>,
    state: Mutex<ControllerState>,
    snapshots: watch::Sender<AccessSnapshot>,
}

/// Resolves who is signed in and which screens they may reach.
///
/// Cloning yields another handle to the same controller. Each `new` call
/// creates an isolated instance; there is no process-wide session state.
#[derive(Clone)]
pub struct AccessController {
    inner: Arc<Inner>,
}

impl AccessController {
    /// Creates a controller in the `Loading` state. Call `init` to resolve.
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionProvider>, directory: Arc<dyn RoleDirectory>) -> Self {
        let (snapshots, _) = watch::channel(AccessSnapshot::initial());
        Self {
            inner: Arc::new(Inner {
                sessions,
                directory,
                state: Mutex::new(ControllerState::new()),
                snapshots,
            }),
        }
    }

    /// Returns a receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AccessSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Returns the current snapshot.
    pub async fn snapshot(&self) -> AccessSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    /// Returns the fault recorded by the last identity resolution, if any.
    ///
    /// Identity faults never block the UI; this is the only place they are
    /// visible apart from the logs.
    pub async fn diagnostics(&self) -> Option<AccessFault> {
        self.inner.state.lock().await.diagnostics.clone()
    }

    /// Runs the first resolution.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Disposed` if the controller was disposed.
    pub async fn init(&self) -> Result<AccessSnapshot, AccessError> {
        self.resolve().await
    }

    /// Re-runs identity then role resolution, entering `Loading` first.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Disposed` if the controller was disposed.
    pub async fn retry(&self) -> Result<AccessSnapshot, AccessError> {
        info!("retrying access resolution");
        self.resolve().await
    }

    /// Retries until the resolution stops failing or the policy runs out.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Disposed` if the controller was disposed.
    pub async fn retry_with(&self, policy: RetryPolicy) -> Result<AccessSnapshot, AccessError> {
        let mut snapshot = self.retry().await?;
        for attempt in 2..=policy.attempts() {
            if !snapshot.resolution().is_failed() {
                break;
            }
            if !policy.delay.is_zero() {
                tokio::time::sleep(policy.delay).await;
            }
            debug!(attempt, "retry attempt");
            snapshot = self.retry().await?;
        }
        Ok(snapshot)
    }

    /// Queries the session provider and applies the result.
    ///
    /// Provider errors and panics resolve to `None`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::RetryRequired` from a `Failed` state, or
    /// `Disposed`/`Superseded` if the result arrived for a resolution that is
    /// no longer active.
    pub async fn resolve_identity(&self) -> Result<Option<Identity>, AccessError> {
        let generation = {
            let state = self.inner.state.lock().await;
            state.ensure_live()?;
            state.ensure_not_failed()?;
            state.generation
        };
        self.identity_phase(generation).await
    }

    /// Looks up the role for the confirmed current identity.
    ///
    /// On failure the resolution moves to `Failed` and the returned lookup is
    /// `Unresolved`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::IdentityNotConfirmed` if `identity` is not the
    /// identity the controller currently holds, `RetryRequired` from a
    /// `Failed` state, or `Disposed`/`Superseded` if the result arrived too
    /// late to apply.
    pub async fn resolve_role(&self, identity: &Identity) -> Result<RoleLookup, AccessError> {
        let generation = {
            let state = self.inner.state.lock().await;
            state.ensure_live()?;
            state.ensure_not_failed()?;
            if state.identity.as_ref() != Some(identity) {
                return Err(AccessError::IdentityNotConfirmed);
            }
            state.generation
        };
        self.role_phase(generation, identity).await
    }

    /// Signs in and re-drives resolution with the new identity.
    ///
    /// A rejected sign-in leaves the published state untouched.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::SignIn` with the provider's message, or
    /// `AccessError::Disposed`.
    #[instrument(skip(self, credential), fields(email = %credential.email()))]
    pub async fn sign_in(&self, credential: &Credential) -> Result<AccessSnapshot, AccessError> {
        self.inner.state.lock().await.ensure_live()?;
        let identity = self
            .inner
            .sessions
            .sign_in(credential)
            .await
            .map_err(|err| AccessError::SignIn {
                reason: err.to_string(),
            })?;
        info!(user_id = %identity.id(), "signed in");
        self.drive_from(Some(identity), false).await
    }

    /// Signs out and re-drives resolution to the logged-out state.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::SignOut` with the provider's message, or
    /// `AccessError::Disposed`.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<AccessSnapshot, AccessError> {
        self.inner.state.lock().await.ensure_live()?;
        self.inner
            .sessions
            .sign_out()
            .await
            .map_err(|err| AccessError::SignOut {
                reason: err.to_string(),
            })?;
        info!("signed out");
        self.drive_from(None, false).await
    }

    /// Re-drives resolution whenever the provider reports a session change.
    ///
    /// Returns false if the provider cannot push session events. The
    /// background task holds a handle to the controller and ends on
    /// `dispose`.
    pub async fn follow_session_changes(&self) -> bool {
        let Some(mut events) = self.inner.sessions.session_events() else {
            debug!("session provider does not push session changes");
            return false;
        };

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let outcome = match events.recv().await {
                    Ok(SessionEvent::SignedIn(identity)) => {
                        debug!(user_id = %identity.id(), "external sign-in observed");
                        controller.drive_from(Some(identity), true).await
                    }
                    Ok(SessionEvent::SignedOut) => {
                        debug!("external sign-out observed");
                        controller.drive_from(None, true).await
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "session events lagged, re-resolving");
                        controller.resolve().await
                    }
                    Err(RecvError::Closed) => break,
                };
                if matches!(outcome, Err(AccessError::Disposed)) {
                    break;
                }
            }
        });

        let mut state = self.inner.state.lock().await;
        if state.disposed {
            handle.abort();
            return false;
        }
        if let Some(previous) = state.follower.replace(handle) {
            previous.abort();
        }
        true
    }

    /// Tears the controller down. Results still in flight are discarded.
    pub async fn dispose(&self) {
        let mut state = self.inner.state.lock().await;
        if state.disposed {
            return;
        }
        state.disposed = true;
        if let Some(follower) = state.follower.take() {
            follower.abort();
        }
        debug!(generation = state.generation, "access controller disposed");
    }

    #[instrument(skip(self))]
    async fn resolve(&self) -> Result<AccessSnapshot, AccessError> {
        let generation = self.begin().await?;
        let outcome = match self.identity_phase(generation).await {
            Ok(Some(identity)) => self.role_phase(generation, &identity).await.map(|_| ()),
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };
        self.settle(outcome).await
    }

    /// Starts a new resolution session in `Loading`.
    async fn begin(&self) -> Result<u64, AccessError> {
        let mut state = self.inner.state.lock().await;
        state.ensure_live()?;
        state.generation += 1;
        state.identity = None;
        state.role = RoleLookup::Unresolved;
        state.resolution = ResolutionState::Loading;
        self.publish(&state);
        Ok(state.generation)
    }

    /// Starts a new resolution session with an identity already known.
    ///
    /// With `only_if_changed`, nothing happens when the controller already
    /// holds that identity in a non-failed state.
    async fn drive_from(
        &self,
        identity: Option<Identity>,
        only_if_changed: bool,
    ) -> Result<AccessSnapshot, AccessError> {
        let generation = {
            let mut state = self.inner.state.lock().await;
            state.ensure_live()?;
            if only_if_changed
                && state.identity == identity
                && state.resolution == ResolutionState::Ready
            {
                return Ok(state.snapshot());
            }
            state.generation += 1;
            Self::apply_identity(&mut state, identity.clone(), None);
            self.publish(&state);
            state.generation
        };

        let outcome = match identity {
            Some(identity) => self.role_phase(generation, &identity).await.map(|_| ()),
            None => Ok(()),
        };
        self.settle(outcome).await
    }

    async fn identity_phase(&self, generation: u64) -> Result<Option<Identity>, AccessError> {
        let result = AssertUnwindSafe(self.inner.sessions.current_identity())
            .catch_unwind()
            .await;
        let (identity, fault) = match result {
            Ok(Ok(identity)) => (identity, None),
            Ok(Err(err)) => (None, Some(AccessFault::from(err))),
            Err(panic) => {
                let fault = AccessFault::UnexpectedException {
                    message: panic_message(panic.as_ref()),
                };
                (None, Some(fault.settle(Phase::Identity)))
            }
        };

        let mut state = self.inner.state.lock().await;
        if let Err(err) = state.ensure_current(generation) {
            debug!(generation, "discarding stale identity result");
            return Err(err);
        }
        state.ensure_not_failed()?;
        if let Some(AccessFault::ExpectedAbsence {
            detail: Some(detail),
        }) = &fault
        {
            warn!(%detail, "identity lookup failed, continuing signed out");
        }
        match &identity {
            Some(identity) => info!(user_id = %identity.id(), "identity resolved"),
            None => info!("no active session"),
        }
        Self::apply_identity(&mut state, identity.clone(), fault);
        self.publish(&state);
        Ok(identity)
    }

    async fn role_phase(
        &self,
        generation: u64,
        identity: &Identity,
    ) -> Result<RoleLookup, AccessError> {
        let result = AssertUnwindSafe(self.inner.directory.role_of(identity.id()))
            .catch_unwind()
            .await;
        let outcome = match result {
            Ok(Ok(role)) => Ok(RoleLookup::from(role)),
            Ok(Err(err)) => Err(AccessFault::from(err)),
            Err(panic) => Err(AccessFault::UnexpectedException {
                message: panic_message(panic.as_ref()),
            }
            .settle(Phase::Role)),
        };

        let mut state = self.inner.state.lock().await;
        if let Err(err) = state.ensure_current(generation) {
            debug!(generation, "discarding stale role result");
            return Err(err);
        }
        if state.identity.as_ref() != Some(identity) {
            debug!(generation, "identity changed during role lookup");
            return Err(AccessError::Superseded { generation });
        }
        state.ensure_not_failed()?;

        match outcome {
            Ok(role) => {
                info!(user_id = %identity.id(), %role, "role resolved");
                state.role = role;
                state.resolution = ResolutionState::Ready;
                self.publish(&state);
                Ok(role)
            }
            Err(fault) => {
                let message = match fault {
                    AccessFault::TransientLookupFailure { message } => message,
                    other => other.to_string(),
                };
                warn!(user_id = %identity.id(), %message, "role lookup failed");
                state.role = RoleLookup::Unresolved;
                state.resolution = ResolutionState::Failed(message);
                self.publish(&state);
                Ok(RoleLookup::Unresolved)
            }
        }
    }

    fn apply_identity(
        state: &mut ControllerState,
        identity: Option<Identity>,
        fault: Option<AccessFault>,
    ) {
        state.identity = identity;
        state.role = RoleLookup::Unresolved;
        state.resolution = ResolutionState::Ready;
        state.diagnostics = fault;
    }

    /// Maps a finished resolution to the caller's result.
    ///
    /// A superseded resolution is not an error for the caller: the newer one
    /// owns the state.
    async fn settle(&self, outcome: Result<(), AccessError>) -> Result<AccessSnapshot, AccessError> {
        match outcome {
            Ok(()) | Err(AccessError::Superseded { .. }) => Ok(self.snapshot().await),
            Err(err) => Err(err),
        }
    }

    fn publish(&self, state: &ControllerState) {
        self.inner.snapshots.send_replace(state.snapshot());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during resolution".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LookupError, SessionError};
    use crate::identity::Registration;
    use crate::memory::LocalSessions;
    use crate::role::Role;
    use crate::route::{Route, RouteSet};
    use crate::state::Presentation;
    use async_trait::async_trait;
    use gymdesk_core::UserId;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    type Log = Arc<std::sync::Mutex<Vec<&'static str>>>;

    /// Session provider returning a fixed answer.
    struct FixedSessions {
        answer: Result<Option<Identity>, SessionError>,
        panics: bool,
        log: Log,
    }

    impl FixedSessions {
        fn signed_in(identity: Identity) -> Self {
            Self::answering(Ok(Some(identity)))
        }

        fn answering(answer: Result<Option<Identity>, SessionError>) -> Self {
            Self {
                answer,
                panics: false,
                log: Log::default(),
            }
        }
    }

    #[async_trait]
    impl SessionProvider for FixedSessions {
        async fn current_identity(&self) -> Result<Option<Identity>, SessionError> {
            self.log.lock().unwrap().push("identity:start");
            tokio::task::yield_now().await;
            if self.panics {
                panic!("session store corrupted");
            }
            self.log.lock().unwrap().push("identity:end");
            self.answer.clone()
        }

        async fn sign_in(&self, _credential: &Credential) -> Result<Identity, SessionError> {
            Err(SessionError::InvalidCredentials {
                reason: "Invalid login credentials".to_string(),
            })
        }

        async fn sign_up(&self, _registration: &Registration) -> Result<Identity, SessionError> {
            Err(SessionError::Rejected {
                reason: "disabled".to_string(),
            })
        }

        async fn sign_out(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    /// One scripted answer from the directory.
    struct Step {
        answer: Result<Option<Role>, LookupError>,
        gate: Option<Arc<Notify>>,
        panics: bool,
    }

    impl Step {
        fn answer(answer: Result<Option<Role>, LookupError>) -> Self {
            Self {
                answer,
                gate: None,
                panics: false,
            }
        }

        fn gated(answer: Result<Option<Role>, LookupError>, gate: Arc<Notify>) -> Self {
            Self {
                answer,
                gate: Some(gate),
                panics: false,
            }
        }
    }

    /// Role directory replaying scripted steps, then a fallback answer.
    struct ScriptedDirectory {
        steps: std::sync::Mutex<VecDeque<Step>>,
        fallback: Result<Option<Role>, LookupError>,
        started: Notify,
        calls: AtomicUsize,
        log: Log,
    }

    impl ScriptedDirectory {
        fn always(answer: Result<Option<Role>, LookupError>) -> Self {
            Self::scripted(Vec::new(), answer)
        }

        fn scripted(steps: Vec<Step>, fallback: Result<Option<Role>, LookupError>) -> Self {
            Self {
                steps: std::sync::Mutex::new(steps.into()),
                fallback,
                started: Notify::new(),
                calls: AtomicUsize::new(0),
                log: Log::default(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RoleDirectory for ScriptedDirectory {
        async fn role_of(&self, _id: &UserId) -> Result<Option<Role>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push("role");
            let step = self.steps.lock().unwrap().pop_front();
            self.started.notify_one();
            match step {
                Some(step) => {
                    if let Some(gate) = step.gate {
                        gate.notified().await;
                    }
                    if step.panics {
                        panic!("role decoder crashed");
                    }
                    step.answer
                }
                None => self.fallback.clone(),
            }
        }
    }

    fn ana() -> Identity {
        Identity::with_email(UserId::from("u-ana"), "ana@gym.test")
    }

    fn timeout() -> LookupError {
        LookupError::Query {
            reason: "timeout".to_string(),
        }
    }

    fn admin_routes() -> RouteSet {
        RouteSet::from_iter([
            Route::Dashboard,
            Route::RegisterUser,
            Route::CreateStudent,
            Route::EditStudent,
            Route::ListUsers,
            Route::EditUser,
        ])
    }

    fn controller(
        sessions: impl SessionProvider + 'static,
        directory: Arc<ScriptedDirectory>,
    ) -> AccessController {
        AccessController::new(Arc::new(sessions), directory)
    }

    #[tokio::test]
    async fn starts_loading_with_no_routes() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(None)));
        let controller = controller(FixedSessions::answering(Ok(None)), directory);
        let snapshot = controller.snapshot().await;
        assert!(snapshot.resolution().is_loading());
        assert!(snapshot.routes().is_empty());
    }

    #[tokio::test]
    async fn no_session_routes_to_login_without_role_lookup() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Administrator))));
        let controller = controller(FixedSessions::answering(Ok(None)), directory.clone());

        let snapshot = controller.init().await.expect("init");
        assert_eq!(snapshot.resolution(), &ResolutionState::Ready);
        assert_eq!(snapshot.routes(), &RouteSet::from_iter([Route::Login]));
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn expired_session_is_expected_absence() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Administrator))));
        let sessions = FixedSessions::answering(Err(SessionError::Expired {
            reason: "session expired".to_string(),
        }));
        let controller = controller(sessions, directory.clone());

        let snapshot = controller.init().await.expect("init");
        assert!(!snapshot.resolution().is_failed());
        assert_eq!(snapshot.routes(), &RouteSet::from_iter([Route::Login]));
        assert_eq!(
            controller.diagnostics().await,
            Some(AccessFault::ExpectedAbsence {
                detail: Some("session expired".to_string())
            })
        );
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn panicking_provider_fails_open_to_login() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Administrator))));
        let mut sessions = FixedSessions::signed_in(ana());
        sessions.panics = true;
        let controller = controller(sessions, directory);

        let snapshot = controller.init().await.expect("init");
        assert_eq!(snapshot.routes(), &RouteSet::from_iter([Route::Login]));
        assert_eq!(
            controller.diagnostics().await,
            Some(AccessFault::ExpectedAbsence {
                detail: Some("session store corrupted".to_string())
            })
        );
    }

    #[tokio::test]
    async fn administrator_reaches_full_set() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Administrator))));
        let controller = controller(FixedSessions::signed_in(ana()), directory);

        let snapshot = controller.init().await.expect("init");
        assert_eq!(snapshot.identity(), Some(&ana()));
        assert_eq!(snapshot.role(), RoleLookup::Resolved(Role::Administrator));
        assert_eq!(snapshot.routes(), &admin_routes());
    }

    #[tokio::test]
    async fn instructor_reaches_dashboard_and_create_student() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Instructor))));
        let controller = controller(FixedSessions::signed_in(ana()), directory);

        let snapshot = controller.init().await.expect("init");
        assert_eq!(
            snapshot.routes(),
            &RouteSet::from_iter([Route::Dashboard, Route::CreateStudent])
        );
    }

    #[tokio::test]
    async fn missing_role_row_reaches_dashboard_only() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(None)));
        let controller = controller(FixedSessions::signed_in(ana()), directory);

        let snapshot = controller.init().await.expect("init");
        assert_eq!(snapshot.role(), RoleLookup::Absent);
        assert_eq!(snapshot.routes(), &RouteSet::from_iter([Route::Dashboard]));
    }

    #[tokio::test]
    async fn pending_role_lookup_exposes_dashboard_only() {
        let gate = Arc::new(Notify::new());
        let directory = Arc::new(ScriptedDirectory::scripted(
            vec![Step::gated(Ok(Some(Role::Administrator)), gate.clone())],
            Ok(None),
        ));
        let controller = controller(FixedSessions::signed_in(ana()), directory.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.init().await }
        });
        directory.started.notified().await;

        let pending = controller.snapshot().await;
        assert_eq!(pending.role(), RoleLookup::Unresolved);
        assert_eq!(pending.routes(), &RouteSet::from_iter([Route::Dashboard]));

        gate.notify_one();
        let snapshot = task.await.expect("join").expect("init");
        assert_eq!(snapshot.routes(), &admin_routes());
    }

    #[tokio::test]
    async fn role_timeout_fails_closed_and_retry_recovers() {
        let directory = Arc::new(ScriptedDirectory::scripted(
            vec![Step::answer(Err(timeout()))],
            Ok(Some(Role::Administrator)),
        ));
        let controller = controller(FixedSessions::signed_in(ana()), directory);

        let failed = controller.init().await.expect("init");
        assert_eq!(
            failed.resolution(),
            &ResolutionState::Failed("timeout".to_string())
        );
        assert!(failed.routes().is_empty());
        assert!(!failed.routes().has_privileged());
        assert_eq!(
            failed.presentation(),
            Presentation::RetryPanel {
                message: "timeout".to_string()
            }
        );

        let recovered = controller.retry().await.expect("retry");
        assert_eq!(recovered.resolution(), &ResolutionState::Ready);
        assert_eq!(recovered.routes(), &admin_routes());
    }

    #[tokio::test]
    async fn failed_state_is_left_only_through_retry() {
        let directory = Arc::new(ScriptedDirectory::scripted(
            vec![Step::answer(Err(timeout()))],
            Ok(Some(Role::Administrator)),
        ));
        let controller = controller(FixedSessions::signed_in(ana()), directory.clone());
        let failed = controller.init().await.expect("init");
        let mut snapshots = controller.subscribe();
        snapshots.mark_unchanged();

        assert_eq!(
            controller.resolve_identity().await,
            Err(AccessError::RetryRequired)
        );
        assert_eq!(
            controller.resolve_role(&ana()).await,
            Err(AccessError::RetryRequired)
        );

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot, failed);
        assert_eq!(
            snapshot.resolution(),
            &ResolutionState::Failed("timeout".to_string())
        );
        assert!(snapshot.routes().is_empty());
        assert!(!snapshots.has_changed().expect("sender alive"));
        assert_eq!(directory.calls(), 1);

        let recovered = controller.retry().await.expect("retry");
        assert_eq!(recovered.routes(), &admin_routes());
    }

    #[tokio::test]
    async fn panicking_directory_fails_closed() {
        let directory = Arc::new(ScriptedDirectory::scripted(
            vec![Step {
                answer: Ok(Some(Role::Administrator)),
                gate: None,
                panics: true,
            }],
            Ok(Some(Role::Administrator)),
        ));
        let controller = controller(FixedSessions::signed_in(ana()), directory);

        let snapshot = controller.init().await.expect("init");
        assert_eq!(
            snapshot.resolution(),
            &ResolutionState::Failed("role decoder crashed".to_string())
        );
        assert!(snapshot.routes().is_empty());
    }

    #[tokio::test]
    async fn retry_twice_matches_retry_once() {
        let once = {
            let directory = Arc::new(ScriptedDirectory::scripted(
                vec![Step::answer(Err(timeout()))],
                Ok(Some(Role::Instructor)),
            ));
            let controller = controller(FixedSessions::signed_in(ana()), directory);
            controller.init().await.expect("init");
            controller.retry().await.expect("retry")
        };

        let directory = Arc::new(ScriptedDirectory::scripted(
            vec![Step::answer(Err(timeout()))],
            Ok(Some(Role::Instructor)),
        ));
        let controller = controller(FixedSessions::signed_in(ana()), directory);
        controller.init().await.expect("init");
        controller.retry().await.expect("first retry");
        let twice = controller.retry().await.expect("second retry");

        assert_eq!(twice.resolution(), once.resolution());
        assert_eq!(twice.routes(), once.routes());
        assert_eq!(twice.role(), once.role());
    }

    #[tokio::test]
    async fn concurrent_retries_settle_on_one_state() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Instructor))));
        let controller = controller(FixedSessions::signed_in(ana()), directory);
        controller.init().await.expect("init");

        let (first, second) = tokio::join!(controller.retry(), controller.retry());
        first.expect("first retry");
        second.expect("second retry");

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.resolution(), &ResolutionState::Ready);
        assert_eq!(
            snapshot.routes(),
            &RouteSet::from_iter([Route::Dashboard, Route::CreateStudent])
        );
    }

    #[tokio::test]
    async fn role_lookup_starts_after_identity_completes() {
        let sessions = FixedSessions::signed_in(ana());
        let log = sessions.log.clone();
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Instructor))));
        let directory_log = directory.log.clone();
        let controller = controller(sessions, directory);

        controller.init().await.expect("init");

        let identity_log = log.lock().unwrap().clone();
        assert_eq!(identity_log, vec!["identity:start", "identity:end"]);
        assert_eq!(directory_log.lock().unwrap().clone(), vec!["role"]);
    }

    #[tokio::test]
    async fn role_lookup_requires_confirmed_identity() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Administrator))));
        let controller = controller(FixedSessions::answering(Ok(None)), directory.clone());
        controller.init().await.expect("init");

        let err = controller.resolve_role(&ana()).await.unwrap_err();
        assert_eq!(err, AccessError::IdentityNotConfirmed);
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn explicit_phases_resolve_in_order() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Instructor))));
        let controller = controller(FixedSessions::signed_in(ana()), directory);

        let identity = controller
            .resolve_identity()
            .await
            .expect("identity")
            .expect("signed in");
        let role = controller.resolve_role(&identity).await.expect("role");
        assert_eq!(role, RoleLookup::Resolved(Role::Instructor));
    }

    #[tokio::test]
    async fn late_role_result_is_discarded_after_dispose() {
        let gate = Arc::new(Notify::new());
        let directory = Arc::new(ScriptedDirectory::scripted(
            vec![Step::gated(Ok(Some(Role::Administrator)), gate.clone())],
            Ok(None),
        ));
        let controller = controller(FixedSessions::signed_in(ana()), directory.clone());
        let mut snapshots = controller.subscribe();

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.init().await }
        });
        directory.started.notified().await;

        let before = controller.snapshot().await;
        controller.dispose().await;
        snapshots.mark_unchanged();
        gate.notify_one();

        assert_eq!(task.await.expect("join"), Err(AccessError::Disposed));
        let after = controller.snapshot().await;
        assert_eq!(after, before);
        assert_eq!(after.role(), RoleLookup::Unresolved);
        assert!(!snapshots.has_changed().expect("sender alive"));
    }

    #[tokio::test]
    async fn late_role_result_is_discarded_after_reset() {
        let gate = Arc::new(Notify::new());
        let directory = Arc::new(ScriptedDirectory::scripted(
            vec![Step::gated(Ok(Some(Role::Administrator)), gate.clone())],
            Ok(Some(Role::Instructor)),
        ));
        let controller = controller(FixedSessions::signed_in(ana()), directory.clone());

        let stale = tokio::spawn({
            let controller = controller.clone();
            async move { controller.init().await }
        });
        directory.started.notified().await;

        let fresh = controller.retry().await.expect("retry");
        assert_eq!(fresh.role(), RoleLookup::Resolved(Role::Instructor));

        gate.notify_one();
        stale.await.expect("join").expect("superseded init still returns");

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.role(), RoleLookup::Resolved(Role::Instructor));
        assert!(!snapshot.routes().contains(Route::ListUsers));
    }

    #[tokio::test]
    async fn disposed_controller_rejects_operations() {
        let directory = Arc::new(ScriptedDirectory::always(Ok(None)));
        let controller = controller(FixedSessions::answering(Ok(None)), directory);
        controller.dispose().await;

        assert_eq!(controller.init().await, Err(AccessError::Disposed));
        assert_eq!(controller.retry().await, Err(AccessError::Disposed));
        assert!(!controller.follow_session_changes().await);
    }

    #[tokio::test]
    async fn retry_policy_stops_on_success() {
        let directory = Arc::new(ScriptedDirectory::scripted(
            vec![
                Step::answer(Err(timeout())),
                Step::answer(Err(timeout())),
                Step::answer(Err(timeout())),
            ],
            Ok(Some(Role::Administrator)),
        ));
        let controller = controller(FixedSessions::signed_in(ana()), directory.clone());
        controller.init().await.expect("init");

        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let snapshot = controller.retry_with(policy).await.expect("retry");
        assert_eq!(snapshot.routes(), &admin_routes());
        assert_eq!(directory.calls(), 4);
    }

    #[tokio::test]
    async fn retry_policy_gives_up_after_max_attempts() {
        let directory = Arc::new(ScriptedDirectory::always(Err(timeout())));
        let controller = controller(FixedSessions::signed_in(ana()), directory.clone());
        controller.init().await.expect("init");

        let snapshot = controller
            .retry_with(RetryPolicy::new(2, Duration::ZERO))
            .await
            .expect("retry");
        assert!(snapshot.resolution().is_failed());
        assert_eq!(directory.calls(), 3);
    }

    #[tokio::test]
    async fn sign_in_and_sign_out_re_drive_resolution() {
        let sessions = LocalSessions::new();
        sessions.insert_principal(UserId::from("u-ana"), "ana@gym.test", "secret1");
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Administrator))));
        let controller = controller(sessions, directory);
        controller.init().await.expect("init");

        let rejected = controller
            .sign_in(&Credential::new("ana@gym.test", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(
            rejected,
            AccessError::SignIn {
                reason: "Invalid login credentials".to_string()
            }
        );
        assert_eq!(
            controller.snapshot().await.routes(),
            &RouteSet::from_iter([Route::Login])
        );

        let signed_in = controller
            .sign_in(&Credential::new("ana@gym.test", "secret1"))
            .await
            .expect("sign in");
        assert_eq!(signed_in.routes(), &admin_routes());

        let signed_out = controller.sign_out().await.expect("sign out");
        assert_eq!(signed_out.routes(), &RouteSet::from_iter([Route::Login]));
    }

    #[tokio::test]
    async fn follows_external_session_changes() {
        let sessions = Arc::new(LocalSessions::new());
        sessions.insert_principal(UserId::from("u-ana"), "ana@gym.test", "secret1");
        let directory = Arc::new(ScriptedDirectory::always(Ok(Some(Role::Instructor))));
        let controller = AccessController::new(sessions.clone(), directory);
        controller.init().await.expect("init");
        assert!(controller.follow_session_changes().await);

        let mut snapshots = controller.subscribe();
        sessions
            .sign_in(&Credential::new("ana@gym.test", "secret1"))
            .await
            .expect("external sign in");
        tokio::time::timeout(
            Duration::from_secs(5),
            snapshots.wait_for(|s| s.role() == RoleLookup::Resolved(Role::Instructor)),
        )
        .await
        .expect("sign-in observed")
        .expect("sender alive");

        sessions.sign_out().await.expect("external sign out");
        tokio::time::timeout(
            Duration::from_secs(5),
            snapshots.wait_for(|s| s.routes() == &RouteSet::from_iter([Route::Login])),
        )
        .await
        .expect("sign-out observed")
        .expect("sender alive");

        controller.dispose().await;
    }
}
