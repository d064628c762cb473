//! Restore Session Use Case
//!
//! Finds a persisted session good enough to hydrate the gate optimistically.

use std::sync::Arc;

use chrono::Utc;

use crate::application::config::GateConfig;
use crate::domain::entity::session::Session;
use crate::domain::repository::SessionStore;

pub struct RestoreSessionUseCase<S>
where
    S: SessionStore,
{
    store: Arc<S>,
    config: Arc<GateConfig>,
}

impl<S> RestoreSessionUseCase<S>
where
    S: SessionStore,
{
    pub fn new(store: Arc<S>, config: Arc<GateConfig>) -> Self {
        Self { store, config }
    }

    /// A restorable session, judged against the current time
    pub async fn execute(&self) -> Option<Session> {
        self.execute_at(Utc::now().timestamp()).await
    }

    /// A restorable session, judged against `now` (unix seconds).
    ///
    /// Storage failures and malformed data are logged and read as "nothing
    /// stored".
    pub async fn execute_at(&self, now: i64) -> Option<Session> {
        let stored = match self.store.load().await {
            Ok(stored) => stored?,
            Err(e) => {
                e.log();
                return None;
            }
        };

        if stored.is_fresh_at(now, self.config.optimistic_margin) {
            tracing::debug!(subject = %stored.subject(), "Restorable local session found");
            Some(stored)
        } else {
            tracing::info!(
                subject = %stored.subject(),
                expires_at = stored.expires_at,
                "Local session found but expired or about to expire"
            );
            None
        }
    }
}
