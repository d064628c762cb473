//! Session Hub
//!
//! Current session plus fan-out to auth subscriptions. Shared by every auth
//! service implementation so they all honour the same contract: the current
//! session is delivered on subscribe, every change afterwards.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::domain::entity::auth_change::{AuthChange, AuthEvent, AuthSubscription};
use crate::domain::entity::session::Session;

#[derive(Debug, Default)]
pub struct SessionHub {
    inner: Mutex<HubInner>,
}

#[derive(Debug, Default)]
struct HubInner {
    current: Option<Session>,
    subscribers: Vec<mpsc::UnboundedSender<AuthChange>>,
    /// Deliveries queued while notifications are held
    held: Option<Vec<(mpsc::UnboundedSender<AuthChange>, AuthChange)>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Option<Session>) -> Self {
        Self {
            inner: Mutex::new(HubInner {
                current: session,
                ..HubInner::default()
            }),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.lock().current.clone()
    }

    pub fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        let initial = AuthChange {
            event: AuthEvent::InitialSession,
            session: inner.current.clone(),
        };
        inner.deliver(&tx, initial);
        inner.subscribers.push(tx);

        AuthSubscription::new(rx)
    }

    /// Replace the current session and notify every live subscriber
    pub fn publish(&self, event: AuthEvent, session: Option<Session>) {
        let mut inner = self.lock();
        inner.current = session.clone();
        let subscribers = inner.broadcast(AuthChange { event, session });

        tracing::debug!(event = %event, subscribers, "Published auth change");
    }

    /// Publish `SIGNED_OUT`, but only while `expected` is still current
    pub fn expire(&self, expected: &Session) -> bool {
        let mut inner = self.lock();
        if inner.current.as_ref() != Some(expected) {
            return false;
        }
        inner.current = None;
        inner.broadcast(AuthChange {
            event: AuthEvent::SignedOut,
            session: None,
        });

        tracing::info!(subject = %expected.subject(), "Session expired");
        true
    }

    /// Subscriptions that have not been dropped
    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Queue deliveries instead of sending them, until [`Self::release`]
    #[cfg(test)]
    pub fn hold(&self) {
        let mut inner = self.lock();
        if inner.held.is_none() {
            inner.held = Some(Vec::new());
        }
    }

    /// Send everything queued while held, in order
    #[cfg(test)]
    pub fn release(&self) {
        let queued = self.lock().held.take().unwrap_or_default();
        for (tx, change) in queued {
            // A closed receiver just means the subscriber went away.
            let _ = tx.send(change);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HubInner {
    /// Send `change` to every live subscriber, returning how many there were
    fn broadcast(&mut self, change: AuthChange) -> usize {
        self.subscribers.retain(|tx| !tx.is_closed());
        let subscribers = self.subscribers.clone();
        for tx in &subscribers {
            self.deliver(tx, change.clone());
        }
        subscribers.len()
    }

    fn deliver(&mut self, tx: &mpsc::UnboundedSender<AuthChange>, change: AuthChange) {
        match self.held.as_mut() {
            Some(queue) => queue.push((tx.clone(), change)),
            None => {
                let _ = tx.send(change);
            }
        }
    }
}
