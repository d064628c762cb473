//! In-Memory Backends
//!
//! Auth service and admin directory that live in the process, for running
//! the gate without a hosted backend. Both expose hooks for injecting
//! failures; the test build adds hooks for steering timing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use platform::secret::SecretString;
use tokio::sync::watch;

use super::hub::SessionHub;
use crate::domain::entity::auth_change::{AuthEvent, AuthSubscription};
use crate::domain::entity::session::{AuthUser, Session};
use crate::domain::repository::{AdminDirectory, AuthService, SessionRefresher, SignUpOutcome};
use crate::domain::value_object::credentials::Credentials;
use crate::domain::value_object::subject_id::SubjectId;
use crate::error::{GateError, GateResult};

/// Lifetime of sessions issued by [`InMemoryAuthService`]
const SESSION_TTL_SECS: i64 = 3600;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Auth service
// ============================================================================

#[derive(Debug)]
struct Account {
    user: AuthUser,
    password: SecretString,
}

#[derive(Debug, Default)]
pub struct InMemoryAuthService {
    accounts: Mutex<HashMap<String, Account>>,
    hub: SessionHub,
    auto_confirm: AtomicBool,
    unavailable: AtomicBool,
    refuse_refresh: AtomicBool,
    issued: AtomicU64,
    sign_outs: AtomicUsize,
}

impl InMemoryAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start out already signed in, as after a page reload
    pub fn with_session(session: Session) -> Self {
        Self {
            hub: SessionHub::with_session(Some(session)),
            ..Self::default()
        }
    }

    /// Register an account directly, bypassing sign-up
    pub fn add_account(&self, user: AuthUser, password: impl Into<SecretString>) {
        let Some(email) = user.email.clone() else {
            tracing::warn!(subject = %user.id, "Ignoring account without email");
            return;
        };
        lock(&self.accounts).insert(
            email.to_lowercase(),
            Account {
                user,
                password: password.into(),
            },
        );
    }

    /// Mark an account's email as confirmed
    pub fn confirm_email(&self, email: &str) {
        if let Some(account) = lock(&self.accounts).get_mut(&email.to_lowercase()) {
            account.user.email_confirmed_at = Some(Utc::now());
        }
    }

    /// Issue sessions on sign-up without email confirmation
    pub fn set_auto_confirm(&self, enabled: bool) {
        self.auto_confirm.store(enabled, Ordering::SeqCst);
    }

    /// Make sign-in and sign-up fail as if the service were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Reject refresh tokens, as after a revocation on the server
    pub fn set_refresh_refused(&self, refused: bool) {
        self.refuse_refresh.store(refused, Ordering::SeqCst);
    }

    /// Change the session from outside, e.g. a sign-in in another tab
    pub fn set_session(&self, event: AuthEvent, session: Option<Session>) {
        self.hub.publish(event, session);
    }

    pub fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    /// Queue notifications until [`Self::release_notifications`]
    #[cfg(test)]
    pub fn hold_notifications(&self) {
        self.hub.hold();
    }

    #[cfg(test)]
    pub fn release_notifications(&self) {
        self.hub.release();
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> GateResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GateError::AuthServiceUnavailable(
                "in-memory auth service offline".into(),
            ));
        }
        Ok(())
    }

    fn issue_session(&self, user: AuthUser) -> Session {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let expires_at = Utc::now().timestamp() + SESSION_TTL_SECS;
        let access = format!("access-{}-{n}", user.id);
        let refresh = format!("refresh-{}-{n}", user.id);
        Session::new(user, expires_at, access).with_refresh_token(refresh)
    }
}

impl AuthService for InMemoryAuthService {
    async fn sign_in_with_password(&self, credentials: &Credentials) -> GateResult<Session> {
        self.ensure_available()?;

        let user = {
            let accounts = lock(&self.accounts);
            match accounts.get(credentials.email.as_str()) {
                Some(account) if account.password == credentials.password => account.user.clone(),
                _ => {
                    return Err(GateError::InvalidCredentials(
                        "Invalid login credentials".into(),
                    ));
                }
            }
        };

        let session = self.issue_session(user);
        self.hub.publish(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> GateResult<SignUpOutcome> {
        self.ensure_available()?;
        let auto_confirm = self.auto_confirm.load(Ordering::SeqCst);

        let user = {
            let mut accounts = lock(&self.accounts);
            if accounts.contains_key(credentials.email.as_str()) {
                return Err(GateError::SignUpRejected("User already registered".into()));
            }

            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            let id = SubjectId::new(format!("user-{n}"))?;
            let mut user = AuthUser::new(id).with_email(credentials.email.as_str());
            if auto_confirm {
                user = user.confirmed_at(Utc::now());
            }

            accounts.insert(
                credentials.email.as_str().to_owned(),
                Account {
                    user: user.clone(),
                    password: credentials.password.clone(),
                },
            );
            user
        };

        let session = auto_confirm.then(|| self.issue_session(user.clone()));
        if let Some(session) = &session {
            self.hub.publish(AuthEvent::SignedIn, Some(session.clone()));
        }

        Ok(SignUpOutcome { user, session })
    }

    async fn sign_out(&self) -> GateResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.hub.publish(AuthEvent::SignedOut, None);
        Ok(())
    }

    fn subscribe(&self) -> AuthSubscription {
        self.hub.subscribe()
    }
}

impl SessionRefresher for InMemoryAuthService {
    fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    async fn refresh_session(&self) -> GateResult<Session> {
        self.ensure_available()?;

        let current = self
            .hub
            .current()
            .filter(|s| s.refresh_token.is_some())
            .ok_or_else(|| GateError::InvalidCredentials("Refresh Token Not Found".into()))?;
        if self.refuse_refresh.load(Ordering::SeqCst) {
            return Err(GateError::InvalidCredentials(
                "Invalid Refresh Token: Already Used".into(),
            ));
        }

        let session = self.issue_session(current.user);
        self.hub
            .publish(AuthEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    fn expire_session(&self, session: &Session) -> bool {
        self.hub.expire(session)
    }
}

// ============================================================================
// Admin directory
// ============================================================================

#[derive(Debug)]
pub struct InMemoryAdminDirectory {
    admins: Mutex<HashSet<SubjectId>>,
    failing: AtomicBool,
    /// `false` while lookups are held
    open: watch::Sender<bool>,
    lookups: AtomicUsize,
}

impl Default for InMemoryAdminDirectory {
    fn default() -> Self {
        let (open, _) = watch::channel(true);
        Self {
            admins: Mutex::new(HashSet::new()),
            failing: AtomicBool::new(false),
            open,
            lookups: AtomicUsize::new(0),
        }
    }
}

impl InMemoryAdminDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admins(admins: impl IntoIterator<Item = SubjectId>) -> Self {
        let directory = Self::default();
        lock(&directory.admins).extend(admins);
        directory
    }

    pub fn grant(&self, subject: SubjectId) {
        lock(&self.admins).insert(subject);
    }

    pub fn revoke(&self, subject: &SubjectId) {
        lock(&self.admins).remove(subject);
    }

    /// Make lookups fail, as when the admin table is missing
    pub fn fail_lookups(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Park lookups until [`Self::release`]. Answers are decided when the
    /// lookup starts, only their delivery waits.
    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    /// Lookups started so far, including held ones
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl AdminDirectory for InMemoryAdminDirectory {
    async fn exists(&self, subject: &SubjectId) -> GateResult<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let answer = if self.failing.load(Ordering::SeqCst) {
            Err(GateError::DirectoryUnavailable(
                "relation \"admins\" does not exist".into(),
            ))
        } else {
            Ok(lock(&self.admins).contains(subject))
        };

        let mut open = self.open.subscribe();
        let released = open.wait_for(|open| *open).await.is_ok();
        if !released {
            return Err(GateError::DirectoryUnavailable("directory closed".into()));
        }

        answer
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn admin_user() -> AuthUser {
        AuthUser::new(SubjectId::new("u1").unwrap())
            .with_email("admin@example.com")
            .confirmed_at(Utc::now())
    }

    #[tokio::test]
    async fn test_sign_in_checks_password_and_notifies() {
        let auth = InMemoryAuthService::new();
        auth.add_account(admin_user(), "hunter22");
        let mut sub = auth.subscribe();
        assert_eq!(sub.next().await.unwrap().event, AuthEvent::InitialSession);

        let wrong = Credentials::new("admin@example.com", "nope").unwrap();
        let err = assert_err!(auth.sign_in_with_password(&wrong).await);
        assert_eq!(err.to_string(), "Invalid login credentials");

        let right = Credentials::new("ADMIN@example.com", "hunter22").unwrap();
        let session = assert_ok!(auth.sign_in_with_password(&right).await);
        assert_eq!(session.subject().as_str(), "u1");

        let change = sub.next().await.unwrap();
        assert_eq!(change.event, AuthEvent::SignedIn);
        assert_eq!(change.session, Some(session));
    }

    #[tokio::test]
    async fn test_sign_up_requires_confirmation_unless_auto_confirm() {
        let auth = InMemoryAuthService::new();
        let creds = Credentials::new("new@example.com", "pw").unwrap();

        let outcome = assert_ok!(auth.sign_up(&creds).await);
        assert!(outcome.confirmation_required());
        assert!(!outcome.user.is_email_verified());

        assert!(matches!(
            auth.sign_up(&creds).await,
            Err(GateError::SignUpRejected(_))
        ));

        auth.set_auto_confirm(true);
        let other = Credentials::new("other@example.com", "pw").unwrap();
        let outcome = assert_ok!(auth.sign_up(&other).await);
        assert!(!outcome.confirmation_required());
        assert!(auth.current_session().is_some());
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens_until_refused() {
        let auth = InMemoryAuthService::new();
        auth.add_account(admin_user(), "hunter22");
        let creds = Credentials::new("admin@example.com", "hunter22").unwrap();
        let first = assert_ok!(auth.sign_in_with_password(&creds).await);

        let mut sub = auth.subscribe();
        sub.next().await.unwrap();
        let second = assert_ok!(auth.refresh_session().await);
        assert_ne!(second, first);
        assert_eq!(sub.next().await.unwrap().event, AuthEvent::TokenRefreshed);

        auth.set_refresh_refused(true);
        let err = assert_err!(auth.refresh_session().await);
        assert!(matches!(err, GateError::InvalidCredentials(_)));
        assert_eq!(auth.current_session(), Some(second.clone()));

        assert!(!auth.expire_session(&first));
        assert!(auth.expire_session(&second));
        assert_eq!(sub.next().await.unwrap().event, AuthEvent::SignedOut);
        assert!(auth.current_session().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_service_and_late_confirmation() {
        let auth = InMemoryAuthService::new();
        auth.add_account(
            AuthUser::new(SubjectId::new("u2").unwrap()).with_email("late@example.com"),
            "pw",
        );
        let creds = Credentials::new("late@example.com", "pw").unwrap();
        let before = assert_ok!(auth.sign_in_with_password(&creds).await);
        assert!(!before.user.is_email_verified());

        auth.confirm_email("LATE@example.com");
        let after = assert_ok!(auth.sign_in_with_password(&creds).await);
        assert!(after.user.is_email_verified());

        auth.set_unavailable(true);
        assert!(matches!(
            auth.sign_in_with_password(&creds).await,
            Err(GateError::AuthServiceUnavailable(_))
        ));
        assert!(matches!(
            auth.refresh_session().await,
            Err(GateError::AuthServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_hold_and_failure() {
        let u1 = SubjectId::new("u1").unwrap();
        let directory = Arc::new(InMemoryAdminDirectory::with_admins([u1.clone()]));
        directory.hold();

        let lookup = tokio::spawn({
            let directory = Arc::clone(&directory);
            let u1 = u1.clone();
            async move { directory.exists(&u1).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!lookup.is_finished());
        assert_eq!(directory.lookup_count(), 1);

        // Decided at start, so a later revoke does not change this answer.
        directory.revoke(&u1);
        directory.release();
        assert!(lookup.await.unwrap().unwrap());
        assert!(!directory.exists(&u1).await.unwrap());

        directory.fail_lookups(true);
        assert!(directory.exists(&u1).await.unwrap_err().is_directory_failure());
    }
}
