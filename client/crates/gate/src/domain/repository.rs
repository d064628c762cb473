//! Collaborator Traits
//!
//! Interfaces to what the gate does not own: the hosted auth service, the
//! admin directory table, and local session persistence. Implementations
//! live in the infrastructure layer.

use crate::domain::entity::{
    auth_change::AuthSubscription,
    session::{AuthUser, Session},
};
use crate::domain::value_object::{credentials::Credentials, subject_id::SubjectId};
use crate::error::GateResult;

/// Result of a sign-up request
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    /// Present when the backend confirms accounts automatically
    pub session: Option<Session>,
}

impl SignUpOutcome {
    /// Whether the new account must confirm its email before signing in
    pub fn confirmation_required(&self) -> bool {
        self.session.is_none()
    }
}

/// Auth service trait
#[trait_variant::make(AuthService: Send)]
pub trait LocalAuthService {
    /// Verify an email/password pair and start a session
    async fn sign_in_with_password(&self, credentials: &Credentials) -> GateResult<Session>;

    /// Register a new account
    async fn sign_up(&self, credentials: &Credentials) -> GateResult<SignUpOutcome>;

    /// End the current session
    async fn sign_out(&self) -> GateResult<()>;

    /// Subscribe to session changes.
    ///
    /// The current session is delivered immediately as
    /// `AuthEvent::InitialSession`, then again after every change.
    fn subscribe(&self) -> AuthSubscription;
}

/// Admin directory trait
#[trait_variant::make(AdminDirectory: Send)]
pub trait LocalAdminDirectory {
    /// Whether an admin record exists for the subject
    async fn exists(&self, subject: &SubjectId) -> GateResult<bool>;
}

/// Local session persistence trait
#[trait_variant::make(SessionStore: Send)]
pub trait LocalSessionStore {
    /// Last persisted session.
    ///
    /// Unparsable or unsupported data is `GateError::MalformedLocalSession`.
    async fn load(&self) -> GateResult<Option<Session>>;

    /// Persist the session, replacing any previous one
    async fn save(&self, session: &Session) -> GateResult<()>;

    /// Forget the persisted session
    async fn clear(&self) -> GateResult<()>;
}

/// Session renewal, for auth services whose sessions run out.
///
/// Kept apart from [`AuthService`] because only a background keeper drives
/// it; the gate itself never refreshes.
#[trait_variant::make(SessionRefresher: Send)]
pub trait LocalSessionRefresher {
    /// Session the service currently holds
    fn current_session(&self) -> Option<Session>;

    /// Exchange the current refresh token for a new session.
    ///
    /// Success is announced as `TOKEN_REFRESHED`. A rejected token is
    /// `GateError::InvalidCredentials` and leaves the session in place;
    /// ending it is up to the caller.
    async fn refresh_session(&self) -> GateResult<Session>;

    /// End `session` as `SIGNED_OUT` if it is still the current one.
    ///
    /// Returns whether anything was published.
    fn expire_session(&self, session: &Session) -> bool;
}
