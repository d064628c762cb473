//! Auth Change Notifications
//!
//! What the auth service's subscription delivers: the session as it stands
//! after an event, `None` meaning signed out.

use tokio::sync::mpsc;

use super::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum AuthEvent {
    /// Delivered once, right after subscribing
    #[display("INITIAL_SESSION")]
    InitialSession,
    #[display("SIGNED_IN")]
    SignedIn,
    #[display("SIGNED_OUT")]
    SignedOut,
    #[display("TOKEN_REFRESHED")]
    TokenRefreshed,
    #[display("USER_UPDATED")]
    UserUpdated,
}

#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

/// Receiving end of an auth service subscription.
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: mpsc::UnboundedReceiver<AuthChange>,
}

impl AuthSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<AuthChange>) -> Self {
        Self { receiver }
    }

    /// Next change, `None` once the auth service has gone away
    pub async fn next(&mut self) -> Option<AuthChange> {
        self.receiver.recv().await
    }

    /// Next change if one is already queued
    pub fn try_next(&mut self) -> Option<AuthChange> {
        self.receiver.try_recv().ok()
    }
}
