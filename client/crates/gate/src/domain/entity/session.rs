//! Session Entity
//!
//! Credential bundle issued by the auth service. The gate caches a copy for
//! UI decisions; the auth service stays the source of truth.

use std::time::Duration;

use chrono::{DateTime, Utc};
use platform::secret::SecretString;
use serde::{Deserialize, Serialize};

use crate::domain::value_object::subject_id::SubjectId;

/// Signed-in account as reported by the auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: SubjectId,
    #[serde(default)]
    pub email: Option<String>,
    /// Set once the account owner followed the confirmation link
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn new(id: SubjectId) -> Self {
        Self {
            id,
            email: None,
            email_confirmed_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn confirmed_at(mut self, at: DateTime<Utc>) -> Self {
        self.email_confirmed_at = Some(at);
        self
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Auth session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: AuthUser,
    /// Expiry, unix seconds
    pub expires_at: i64,
    pub access_token: SecretString,
    #[serde(default)]
    pub refresh_token: Option<SecretString>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn new(user: AuthUser, expires_at: i64, access_token: impl Into<SecretString>) -> Self {
        Self {
            user,
            expires_at,
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<SecretString>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn subject(&self) -> &SubjectId {
        &self.user.id
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Whether the session outlives `now + margin`.
    ///
    /// Sessions inside the margin are treated as unusable: they would expire
    /// before a request made with them completes.
    pub fn is_fresh_at(&self, now: i64, margin: Duration) -> bool {
        let margin = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
        self.expires_at > now.saturating_add(margin)
    }

    pub fn is_fresh(&self, margin: Duration) -> bool {
        self.is_fresh_at(Utc::now().timestamp(), margin)
    }

    /// Time left before expiry, zero once expired
    pub fn remaining_at(&self, now: i64) -> Duration {
        Duration::from_secs(u64::try_from(self.expires_at - now).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: i64) -> Session {
        Session::new(AuthUser::new(SubjectId::new("u1").unwrap()), expires_at, "token")
    }

    #[test]
    fn test_freshness_respects_margin() {
        let margin = Duration::from_secs(60);
        assert!(session(1_000 + 61).is_fresh_at(1_000, margin));
        assert!(!session(1_000 + 60).is_fresh_at(1_000, margin));
        assert!(!session(999).is_fresh_at(1_000, margin));
    }

    #[test]
    fn test_expiry_and_remaining() {
        let s = session(1_100);
        assert!(!s.is_expired_at(1_000));
        assert!(s.is_expired_at(1_100));
        assert_eq!(s.remaining_at(1_000), Duration::from_secs(100));
        assert_eq!(s.remaining_at(2_000), Duration::ZERO);
    }

    #[test]
    fn test_deserialize_minimal_blob() {
        let json = r#"{"user":{"id":"u1"},"expires_at":1700000000,"access_token":"t"}"#;
        let s: Session = serde_json::from_str(json).unwrap();
        assert_eq!(s.subject().as_str(), "u1");
        assert_eq!(s.token_type, "bearer");
        assert!(s.refresh_token.is_none());
        assert!(!s.user.is_email_verified());
    }
}
