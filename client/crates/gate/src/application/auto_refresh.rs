//! Automatic Session Refresh
//!
//! Background keeper that renews the auth service's session shortly before
//! it runs out and ends it once it cannot be renewed. The gate only sees
//! the resulting `TOKEN_REFRESHED` / `SIGNED_OUT` notifications, so an
//! expired session moves a confirmed admin to a confirmed guest like any
//! other sign-out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::domain::entity::session::Session;
use crate::domain::repository::{AuthService, SessionRefresher};
use crate::error::GateError;

/// Refresh this long before expiry
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Pause between attempts after a transient failure
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Handle to the refresh task. Dropping it stops the task.
#[derive(Debug)]
pub struct AutoRefresh {
    task: JoinHandle<()>,
}

impl AutoRefresh {
    /// Start keeping `service`'s session alive.
    ///
    /// `margin` is how long before expiry a refresh is attempted.
    pub fn spawn<R>(service: Arc<R>, margin: Duration) -> Self
    where
        R: AuthService + SessionRefresher + Sync + 'static,
    {
        Self {
            task: tokio::spawn(keep_alive(service, margin)),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Refresh schedule for one session, on the tokio clock
#[derive(Debug, Clone)]
struct Plan {
    session: Session,
    expires: Instant,
    refresh_at: Instant,
}

impl Plan {
    fn new(session: Session, margin: Duration) -> Self {
        let remaining = session.remaining_at(Utc::now().timestamp());
        let now = Instant::now();
        let refresh_at = if session.refresh_token.is_some() {
            now + remaining.saturating_sub(margin)
        } else {
            // Nothing to exchange; just end it on time.
            now + remaining
        };

        Self {
            session,
            expires: now + remaining,
            refresh_at,
        }
    }
}

async fn keep_alive<R>(service: Arc<R>, margin: Duration)
where
    R: AuthService + SessionRefresher + Sync + 'static,
{
    let mut subscription = service.subscribe();
    let mut plan: Option<Plan> = None;

    loop {
        let wake = plan.as_ref().map(|p| p.refresh_at);
        tokio::select! {
            change = subscription.next() => match change {
                Some(change) => plan = change.session.map(|s| Plan::new(s, margin)),
                None => break,
            },
            () = sleep_until(wake) => {
                if let Some(due) = plan.take() {
                    plan = attempt(service.as_ref(), due, margin).await;
                }
            }
        }
    }

    tracing::debug!("Auto refresh stopped");
}

/// One refresh attempt, returning the schedule to follow afterwards
async fn attempt<R>(service: &R, due: Plan, margin: Duration) -> Option<Plan>
where
    R: SessionRefresher + Sync,
{
    let subject = due.session.subject().clone();

    if due.session.refresh_token.is_none() {
        service.expire_session(&due.session);
        return None;
    }

    match service.refresh_session().await {
        Ok(session) => Some(Plan::new(session, margin)),
        Err(GateError::InvalidCredentials(reason)) => {
            tracing::info!(subject = %subject, reason = %reason, "Refresh token rejected");
            service.expire_session(&due.session);
            None
        }
        Err(e) if Instant::now() >= due.expires => {
            tracing::warn!(
                subject = %subject,
                error = %e,
                "Session ran out before it could be refreshed"
            );
            service.expire_session(&due.session);
            None
        }
        Err(e) => {
            tracing::warn!(subject = %subject, error = %e, "Session refresh failed, retrying");
            let retry_at = (Instant::now() + RETRY_INTERVAL).min(due.expires);
            Some(Plan {
                refresh_at: retry_at,
                ..due
            })
        }
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
