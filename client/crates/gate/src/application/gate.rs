//! Session Gate
//!
//! Owns the [`GateState`] and publishes it through a `watch` channel.
//! Three triggers write to it:
//!
//! - bootstrap hydration from the persisted session (optimistic, once)
//! - the guest timeout (once, only while still loading)
//! - auth service notifications and completed sign-ins (authoritative)
//!
//! Every authoritative write bumps a generation counter. Background work
//! (admin lookups, optimistic hydration) remembers the generation it started
//! under and may only write while that generation is still current, so a
//! slow optimistic check can never overwrite a newer authoritative value.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use platform::secret::SecretString;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::{AbortHandle, JoinHandle};

use crate::application::check_admin::CheckAdminUseCase;
use crate::application::config::GateConfig;
use crate::application::restore_session::RestoreSessionUseCase;
use crate::application::sign_in::{SignInInput, SignInUseCase};
use crate::application::sign_out::SignOutUseCase;
use crate::application::sign_up::{SignUpInput, SignUpUseCase};
use crate::domain::entity::gate_state::{AdminFlag, GateState, StateSource};
use crate::domain::entity::session::{AuthUser, Session};
use crate::domain::repository::{AdminDirectory, AuthService, SessionStore, SignUpOutcome};
use crate::domain::value_object::subject_id::SubjectId;
use crate::error::{GateError, GateResult};
use crate::presentation::guard::require_confirmed_admin;
use crate::presentation::watcher::GateWatcher;

/// Session gate
///
/// Cheap to clone; clones share one state. Call [`SessionGate::dispose`]
/// when done, background tasks keep the state alive until then.
pub struct SessionGate<A, D, S>
where
    A: AuthService + Send + Sync + 'static,
    D: AdminDirectory + Send + Sync + 'static,
    S: SessionStore + Send + Sync + 'static,
{
    inner: Arc<GateInner<A, D, S>>,
}

impl<A, D, S> Clone for SessionGate<A, D, S>
where
    A: AuthService + Send + Sync + 'static,
    D: AdminDirectory + Send + Sync + 'static,
    S: SessionStore + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct GateInner<A, D, S>
where
    A: AuthService + Send + Sync + 'static,
    D: AdminDirectory + Send + Sync + 'static,
    S: SessionStore + Send + Sync + 'static,
{
    auth: Arc<A>,
    store: Arc<S>,
    config: Arc<GateConfig>,
    restore: RestoreSessionUseCase<S>,
    check_admin: CheckAdminUseCase<D>,
    sign_in: SignInUseCase<A, D>,
    sign_out: SignOutUseCase<A>,
    sign_up: SignUpUseCase<A>,
    state: watch::Sender<GateState>,
    generation: AtomicU64,
    started: AtomicBool,
    alive: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
    background: Mutex<Vec<AbortHandle>>,
    /// Serializes writes to the session store
    persist_lock: AsyncMutex<()>,
}

impl<A, D, S> SessionGate<A, D, S>
where
    A: AuthService + Send + Sync + 'static,
    D: AdminDirectory + Send + Sync + 'static,
    S: SessionStore + Send + Sync + 'static,
{
    pub fn new(auth: Arc<A>, directory: Arc<D>, store: Arc<S>, config: GateConfig) -> Self {
        let config = Arc::new(config);
        let (state, _) = watch::channel(GateState::default());

        Self {
            inner: Arc::new(GateInner {
                restore: RestoreSessionUseCase::new(Arc::clone(&store), Arc::clone(&config)),
                check_admin: CheckAdminUseCase::new(Arc::clone(&directory)),
                sign_in: SignInUseCase::new(Arc::clone(&auth), directory),
                sign_out: SignOutUseCase::new(Arc::clone(&auth)),
                sign_up: SignUpUseCase::new(Arc::clone(&auth)),
                auth,
                store,
                config,
                state,
                generation: AtomicU64::new(0),
                started: AtomicBool::new(false),
                alive: AtomicBool::new(true),
                listener: Mutex::new(None),
                background: Mutex::new(Vec::new()),
                persist_lock: AsyncMutex::new(()),
            }),
        }
    }

    // ========================================================================
    // Reading state
    // ========================================================================

    /// Current state snapshot
    pub fn state(&self) -> GateState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn watch(&self) -> GateWatcher {
        GateWatcher::new(self.inner.state.subscribe())
    }

    pub fn config(&self) -> &GateConfig {
        &self.inner.config
    }

    pub fn is_disposed(&self) -> bool {
        !self.inner.is_alive()
    }

    /// The signed-in admin, only once confirmed by the admin directory.
    ///
    /// Use this before actions that cannot be undone; the optimistic flag
    /// is not enough for them.
    pub fn confirmed_admin(&self) -> GateResult<AuthUser> {
        require_confirmed_admin(&self.inner.state.borrow()).cloned()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Hydrate from the persisted session, then subscribe to the auth service.
    ///
    /// When this returns, a restorable session has already been published
    /// as an optimistic admin with `loading = false`. Without one the state
    /// stays loading until the auth service answers or the guest timeout
    /// fires. Calling it twice is a no-op.
    pub async fn bootstrap(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Session gate already bootstrapped");
            return;
        }

        match self.inner.restore.execute().await {
            Some(session) => self.hydrate(session),
            None => self.arm_guest_timeout(),
        }

        self.listen();
    }

    /// Release the auth subscription and stop background work.
    ///
    /// Lookups still in flight complete into nothing.
    pub async fn dispose(&self) {
        if !self.inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }

        for handle in lock(&self.inner.background).drain(..) {
            handle.abort();
        }

        let listener = lock(&self.inner.listener).take();
        if let Some(handle) = listener {
            handle.abort();
            // Awaiting guarantees the subscription has been dropped.
            let _ = handle.await;
        }

        tracing::debug!("Session gate disposed");
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Apply an authoritative session value, then settle admin status.
    ///
    /// Replaces `user`/`session` unconditionally. With no session the gate
    /// becomes a guest immediately.
    pub async fn on_session_change(&self, session: Option<Session>) {
        if let Some((subject, generation)) = self.apply_session(session).await {
            self.settle_admin(subject, generation).await;
        }
    }

    /// Look up admin status for `subject`.
    ///
    /// Never fails: lookup errors read as `false`. Always ends the loading
    /// phase, unless a newer session arrived in the meantime.
    pub async fn check_admin_status(&self, subject: &SubjectId) -> bool {
        let generation = self.inner.generation();
        self.settle_admin(subject.clone(), generation).await
    }

    /// Sign in as an administrator.
    ///
    /// Fails with `EmailNotVerified`, `NotAuthorized` or
    /// `DirectoryUnavailable` after signing the account back out; on success
    /// the admin flag is confirmed. A disposed gate refuses with `Disposed`,
    /// also when disposal happens while the credentials are being checked.
    pub async fn sign_in(
        &self,
        email: &str,
        password: impl Into<SecretString>,
    ) -> GateResult<Session> {
        if !self.inner.is_alive() {
            let err = GateError::Disposed;
            err.log();
            return Err(err);
        }

        let input = SignInInput {
            email: email.to_owned(),
            password: password.into(),
        };
        let session = self
            .inner
            .sign_in
            .execute(input)
            .await
            .inspect_err(|e| e.log())?;

        let published = self.inner.publish_authoritative(|state| {
            state.user = Some(session.user.clone());
            state.session = Some(session.clone());
            state.admin = AdminFlag::Granted;
            state.loading = false;
        });
        let Some(generation) = published else {
            // Nobody is left to track the new session.
            if let Err(e) = self.inner.sign_out.execute().await {
                e.log();
            }
            let err = GateError::Disposed;
            err.log();
            return Err(err);
        };
        self.persist(Some(&session), generation).await;

        Ok(session)
    }

    /// Ask the auth service to end the session.
    ///
    /// State is left alone; the `SIGNED_OUT` notification clears it.
    pub async fn sign_out(&self) -> GateResult<()> {
        self.inner
            .sign_out
            .execute()
            .await
            .inspect_err(|e| e.log())
    }

    /// Register a new account. Does not touch gate state.
    pub async fn sign_up(
        &self,
        email: &str,
        password: impl Into<SecretString>,
    ) -> GateResult<SignUpOutcome> {
        let input = SignUpInput {
            email: email.to_owned(),
            password: password.into(),
        };
        self.inner.sign_up.execute(input).await.inspect_err(|e| e.log())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn hydrate(&self, session: Session) {
        let subject = session.subject().clone();
        let generation = self.inner.generation();

        let applied = self.inner.publish_if_current(generation, |state| {
            state.user = Some(session.user.clone());
            state.session = Some(session);
            state.admin = AdminFlag::Optimistic;
            state.loading = false;
            state.source = StateSource::Optimistic;
        });
        if !applied {
            tracing::debug!("Authoritative session already present, skipping hydration");
            return;
        }

        tracing::info!(subject = %subject, "Restored admin session optimistically");

        let gate = self.clone();
        self.inner.spawn_background(async move {
            gate.settle_admin(subject, generation).await;
        });
    }

    fn arm_guest_timeout(&self) {
        let inner = Arc::clone(&self.inner);
        let timeout = self.inner.config.guest_timeout;

        self.inner.spawn_background(async move {
            tokio::time::sleep(timeout).await;
            inner.expire_guest_wait();
        });
    }

    fn listen(&self) {
        let mut subscription = self.inner.auth.subscribe();
        let gate = self.clone();

        let handle = tokio::spawn(async move {
            while let Some(change) = subscription.next().await {
                if !gate.inner.is_alive() {
                    break;
                }
                tracing::debug!(
                    event = %change.event,
                    has_session = change.session.is_some(),
                    "Auth state change"
                );

                if let Some((subject, generation)) = gate.apply_session(change.session).await {
                    let verifier = gate.clone();
                    gate.inner.spawn_background(async move {
                        verifier.settle_admin(subject, generation).await;
                    });
                }
            }
            tracing::debug!("Auth subscription ended");
        });

        *lock(&self.inner.listener) = Some(handle);
    }

    /// Authoritative write of `user`/`session`.
    ///
    /// Returns the subject still needing an admin lookup and the generation
    /// that lookup belongs to.
    async fn apply_session(&self, session: Option<Session>) -> Option<(SubjectId, u64)> {
        let subject = session.as_ref().map(|s| s.subject().clone());

        let generation = self.inner.publish_authoritative(|state| {
            let same_subject = subject.as_ref().is_some_and(|id| state.holds(id));
            state.user = session.as_ref().map(|s| s.user.clone());
            state.session = session.clone();

            if subject.is_none() {
                state.admin = AdminFlag::Denied;
                state.loading = false;
            } else if !same_subject {
                state.admin = AdminFlag::Unknown;
            }
        })?;

        self.persist(session.as_ref(), generation).await;
        subject.map(|s| (s, generation))
    }

    /// Directory lookup whose result is written only if `generation` is
    /// still current.
    async fn settle_admin(&self, subject: SubjectId, generation: u64) -> bool {
        let is_admin = self.inner.check_admin.execute(&subject).await;

        let applied = self.inner.publish_if_current(generation, |state| {
            apply_admin_result(state, &subject, is_admin);
        });
        if !applied {
            tracing::debug!(subject = %subject, "Discarding superseded admin lookup");
        } else if !is_admin {
            tracing::info!(subject = %subject, "Admin status denied");
        }

        is_admin
    }

    /// Mirror an authoritative write into the session store.
    ///
    /// Skipped once a newer authoritative write exists; that one persists
    /// its own value.
    async fn persist(&self, session: Option<&Session>, generation: u64) {
        if !self.inner.config.persist_sessions {
            return;
        }
        let _guard = self.inner.persist_lock.lock().await;
        if self.inner.generation() != generation {
            tracing::debug!("Skipping persistence of superseded session");
            return;
        }
        let result = match session {
            Some(session) => self.inner.store.save(session).await,
            None => self.inner.store.clear().await,
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to update local session");
        }
    }
}

impl<A, D, S> GateInner<A, D, S>
where
    A: AuthService + Send + Sync + 'static,
    D: AdminDirectory + Send + Sync + 'static,
    S: SessionStore + Send + Sync + 'static,
{
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Write that supersedes everything before it. `None` once disposed.
    fn publish_authoritative(&self, update: impl FnOnce(&mut GateState)) -> Option<u64> {
        if !self.is_alive() {
            return None;
        }
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            update(state);
            state.source = StateSource::Authoritative;
        });
        Some(generation)
    }

    /// Write on behalf of work started under `generation`.
    ///
    /// The generation is compared while holding the channel's write lock, so
    /// no authoritative write can slip in between check and update.
    fn publish_if_current(&self, generation: u64, update: impl FnOnce(&mut GateState)) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(state);
            true
        })
    }

    /// Guest timeout: checked at fire time, no-op once loading is over
    fn expire_guest_wait(&self) {
        if !self.is_alive() {
            return;
        }
        let fired = self.state.send_if_modified(|state| {
            if !state.loading {
                return false;
            }
            state.loading = false;
            if state.admin == AdminFlag::Unknown {
                state.admin = AdminFlag::Denied;
            }
            if state.source == StateSource::Initial {
                state.source = StateSource::Timeout;
            }
            true
        });
        if fired {
            tracing::info!(
                timeout_ms = self.config.guest_timeout.as_millis() as u64,
                "No session confirmed in time, continuing as guest"
            );
        }
    }

    fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.is_alive() {
            return;
        }
        let handle = tokio::spawn(task);
        let mut background = lock(&self.background);
        background.retain(|h| !h.is_finished());
        background.push(handle.abort_handle());
    }
}

/// Fold a directory answer into the state.
///
/// A positive answer only confirms a session the auth service delivered; on
/// an optimistic session it leaves the display-only flag in place. A
/// negative answer always revokes.
fn apply_admin_result(state: &mut GateState, subject: &SubjectId, is_admin: bool) {
    if state.holds(subject) {
        state.admin = match (is_admin, state.source) {
            (true, StateSource::Authoritative) => AdminFlag::Granted,
            (true, _) => state.admin,
            (false, _) => AdminFlag::Denied,
        };
    }
    state.loading = false;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_holding(source: StateSource, admin: AdminFlag) -> GateState {
        GateState {
            user: Some(AuthUser::new(SubjectId::new("u1").unwrap())),
            admin,
            loading: true,
            source,
            ..GateState::default()
        }
    }

    #[test]
    fn test_positive_lookup_confirms_only_authoritative_sessions() {
        let u1 = SubjectId::new("u1").unwrap();

        let mut state = state_holding(StateSource::Authoritative, AdminFlag::Unknown);
        apply_admin_result(&mut state, &u1, true);
        assert_eq!(state.admin, AdminFlag::Granted);
        assert!(!state.loading);

        let mut state = state_holding(StateSource::Optimistic, AdminFlag::Optimistic);
        apply_admin_result(&mut state, &u1, true);
        assert_eq!(state.admin, AdminFlag::Optimistic);
    }

    #[test]
    fn test_negative_lookup_always_revokes() {
        let u1 = SubjectId::new("u1").unwrap();
        for source in [StateSource::Optimistic, StateSource::Authoritative] {
            let mut state = state_holding(source, AdminFlag::Optimistic);
            apply_admin_result(&mut state, &u1, false);
            assert_eq!(state.admin, AdminFlag::Denied);
            assert!(!state.loading);
        }
    }

    #[test]
    fn test_lookup_for_other_subject_only_ends_loading() {
        let u2 = SubjectId::new("u2").unwrap();
        let mut state = state_holding(StateSource::Authoritative, AdminFlag::Unknown);
        apply_admin_result(&mut state, &u2, true);
        assert_eq!(state.admin, AdminFlag::Unknown);
        assert!(!state.loading);
    }
}
