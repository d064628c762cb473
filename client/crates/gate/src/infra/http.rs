//! HTTP Backend
//!
//! The hosted backend the console runs against: a GoTrue-style auth API under
//! `auth/v1/` and a PostgREST-style table API under `rest/v1/`, sharing one
//! base URL and anon key. [`HttpBackend`] implements both the auth service
//! and the admin directory.

use std::time::Duration;

use chrono::{DateTime, Utc};
use platform::secret::SecretString;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::hub::SessionHub;
use crate::domain::entity::auth_change::{AuthEvent, AuthSubscription};
use crate::domain::entity::session::{AuthUser, Session};
use crate::domain::repository::{AdminDirectory, AuthService, SessionRefresher, SignUpOutcome};
use crate::domain::value_object::credentials::Credentials;
use crate::domain::value_object::subject_id::SubjectId;
use crate::error::{GateError, GateResult};

pub const DEFAULT_ADMIN_TABLE: &str = "admins";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A recovered session closer to expiry than this is refreshed first
const RECOVER_REFRESH_MARGIN: Duration = Duration::from_secs(60);

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, always ending in `/`
    pub url: String,
    pub anon_key: SecretString,
    /// Table holding one row per administrator, keyed by `id`
    pub admin_table: String,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<SecretString>) -> GateResult<Self> {
        let mut url = url.into().trim().to_owned();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(GateError::Configuration(format!(
                "Backend URL must start with http:// or https://, got {url:?}"
            )));
        }
        if !url.ends_with('/') {
            url.push('/');
        }

        let anon_key = anon_key.into();
        if anon_key.is_empty() {
            return Err(GateError::Configuration("Backend anon key is empty".into()));
        }

        Ok(Self {
            url,
            anon_key,
            admin_table: DEFAULT_ADMIN_TABLE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_admin_table(mut self, table: impl Into<String>) -> GateResult<Self> {
        let table = table.into();
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(GateError::Configuration(format!(
                "Invalid admin table name: {table:?}"
            )));
        }
        self.admin_table = table;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<DateTime<Utc>>,
}

impl WireUser {
    fn into_user(self) -> GateResult<AuthUser> {
        Ok(AuthUser {
            id: SubjectId::new(self.id)?,
            email: self.email,
            email_confirmed_at: self.email_confirmed_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    user: WireUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> GateResult<Session> {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs))
            .ok_or_else(|| {
                GateError::AuthServiceUnavailable("Token response carries no expiry".into())
            })?;

        let mut session = Session::new(self.user.into_user()?, expires_at, self.access_token);
        if let Some(refresh) = self.refresh_token {
            session = session.with_refresh_token(refresh);
        }
        if let Some(token_type) = self.token_type {
            session.token_type = token_type;
        }
        Ok(session)
    }
}

/// Sign-up answers with a full session when accounts are confirmed
/// automatically, with the bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(WireUser),
}

/// Error bodies differ between the auth API versions and the table API
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn text(self) -> Option<String> {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
    }
}

async fn error_message(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::text)
        .unwrap_or_else(|| status.to_string());
    (status, message)
}

/// Map a rejected sign-in or refresh
fn auth_rejection(status: StatusCode, message: String) -> GateError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        GateError::AuthServiceUnavailable(message)
    } else if message.eq_ignore_ascii_case("Email not confirmed") {
        GateError::EmailNotVerified
    } else {
        GateError::InvalidCredentials(message)
    }
}

fn auth_unreachable(err: reqwest::Error) -> GateError {
    GateError::AuthServiceUnavailable(err.to_string())
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Debug)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
    hub: SessionHub,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> GateResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GateError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            hub: SessionHub::new(),
        })
    }

    /// Adopt a previously persisted session.
    ///
    /// A session with time left is taken as-is without a round trip; one
    /// about to expire is refreshed first. Returns the session now in
    /// effect, `None` when the stored one could not be revived.
    pub async fn recover(&self, stored: Option<Session>) -> GateResult<Option<Session>> {
        let Some(stored) = stored else {
            return Ok(None);
        };

        if stored.is_fresh(RECOVER_REFRESH_MARGIN) {
            tracing::debug!(subject = %stored.subject(), "Recovered stored session");
            self.hub.publish(AuthEvent::SignedIn, Some(stored.clone()));
            return Ok(Some(stored));
        }

        let Some(refresh_token) = stored.refresh_token.clone() else {
            tracing::info!(subject = %stored.subject(), "Stored session expired, no refresh token");
            return Ok(None);
        };

        match self.refresh_with(&refresh_token).await {
            Ok(session) => {
                tracing::info!(subject = %session.subject(), "Refreshed stored session");
                self.hub.publish(AuthEvent::TokenRefreshed, Some(session.clone()));
                Ok(Some(session))
            }
            Err(GateError::InvalidCredentials(reason)) => {
                tracing::info!(reason = %reason, "Stored session could not be refreshed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.config.endpoint(path))
            .header("apikey", self.config.anon_key.expose_secret())
    }

    /// Bearer for table requests: the signed-in user's token, else the anon key
    fn bearer(&self) -> SecretString {
        self.hub
            .current()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> GateResult<Session> {
        let response = self
            .request(Method::POST, "auth/v1/token")
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await
            .map_err(auth_unreachable)?;

        if !response.status().is_success() {
            let (status, message) = error_message(response).await;
            return Err(auth_rejection(status, message));
        }

        let token: TokenResponse = response.json().await.map_err(auth_unreachable)?;
        token.into_session(Utc::now().timestamp())
    }

    async fn refresh_with(&self, refresh_token: &SecretString) -> GateResult<Session> {
        self.token_grant(
            "refresh_token",
            json!({ "refresh_token": refresh_token.expose_secret() }),
        )
        .await
    }
}

impl AuthService for HttpBackend {
    async fn sign_in_with_password(&self, credentials: &Credentials) -> GateResult<Session> {
        let session = self
            .token_grant(
                "password",
                json!({
                    "email": credentials.email.as_str(),
                    "password": credentials.password.expose_secret(),
                }),
            )
            .await?;

        self.hub.publish(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> GateResult<SignUpOutcome> {
        let response = self
            .request(Method::POST, "auth/v1/signup")
            .json(&json!({
                "email": credentials.email.as_str(),
                "password": credentials.password.expose_secret(),
            }))
            .send()
            .await
            .map_err(auth_unreachable)?;

        if !response.status().is_success() {
            let (status, message) = error_message(response).await;
            return Err(if status.is_server_error() {
                GateError::AuthServiceUnavailable(message)
            } else {
                GateError::SignUpRejected(message)
            });
        }

        match response
            .json::<SignUpResponse>()
            .await
            .map_err(auth_unreachable)?
        {
            SignUpResponse::Session(token) => {
                let session = token.into_session(Utc::now().timestamp())?;
                self.hub.publish(AuthEvent::SignedIn, Some(session.clone()));
                Ok(SignUpOutcome {
                    user: session.user.clone(),
                    session: Some(session),
                })
            }
            SignUpResponse::User(user) => Ok(SignUpOutcome {
                user: user.into_user()?,
                session: None,
            }),
        }
    }

    /// Local sign-out always happens; a failed revoke call is still reported.
    async fn sign_out(&self) -> GateResult<()> {
        let current = self.hub.current();
        self.hub.publish(AuthEvent::SignedOut, None);

        let Some(session) = current else {
            return Ok(());
        };

        let response = self
            .request(Method::POST, "auth/v1/logout")
            .bearer_auth(session.access_token.expose_secret())
            .send()
            .await
            .map_err(auth_unreachable)?;

        let status = response.status();
        // An already revoked token is as good as signed out.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let (_, message) = error_message(response).await;
        Err(GateError::AuthServiceUnavailable(message))
    }

    fn subscribe(&self) -> AuthSubscription {
        self.hub.subscribe()
    }
}

impl SessionRefresher for HttpBackend {
    fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    async fn refresh_session(&self) -> GateResult<Session> {
        let refresh_token = self
            .hub
            .current()
            .and_then(|s| s.refresh_token)
            .ok_or_else(|| GateError::InvalidCredentials("No session to refresh".into()))?;

        let session = self.refresh_with(&refresh_token).await?;
        tracing::debug!(subject = %session.subject(), "Refreshed session");
        self.hub
            .publish(AuthEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    fn expire_session(&self, session: &Session) -> bool {
        self.hub.expire(session)
    }
}

impl AdminDirectory for HttpBackend {
    async fn exists(&self, subject: &SubjectId) -> GateResult<bool> {
        let filter = format!("eq.{subject}");
        let bearer = self.bearer();

        let response = self
            .request(Method::GET, &format!("rest/v1/{}", self.config.admin_table))
            .query(&[("select", "id"), ("id", filter.as_str()), ("limit", "1")])
            .bearer_auth(bearer.expose_secret())
            .send()
            .await
            .map_err(|e| GateError::DirectoryUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let (_, message) = error_message(response).await;
            return Err(GateError::DirectoryUnavailable(message));
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| GateError::DirectoryUnavailable(e.to_string()))?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HttpBackend {
        HttpBackend::new(BackendConfig::new("http://localhost:54321", "anon").unwrap()).unwrap()
    }

    fn session_expiring_in(secs: i64) -> Session {
        Session::new(
            AuthUser::new(SubjectId::new("u1").unwrap()),
            Utc::now().timestamp() + secs,
            "access",
        )
    }

    #[test]
    fn test_config_normalizes_url_and_validates() {
        let config = BackendConfig::new(" https://proj.example.co ", "anon").unwrap();
        assert_eq!(config.url, "https://proj.example.co/");
        assert_eq!(config.endpoint("auth/v1/signup"), "https://proj.example.co/auth/v1/signup");
        assert_eq!(config.admin_table, DEFAULT_ADMIN_TABLE);

        assert!(matches!(
            BackendConfig::new("proj.example.co", "anon"),
            Err(GateError::Configuration(_))
        ));
        assert!(BackendConfig::new("https://x", "").is_err());
        assert!(config.clone().with_admin_table("admins; drop").is_err());
        let staff = config.clone().with_admin_table("staff_admins").unwrap();
        assert_eq!(staff.admin_table, "staff_admins");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.with_timeout(Duration::from_secs(3)).timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_token_response_uses_expires_in_when_needed() {
        let raw = r#"{
            "access_token": "a",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r",
            "user": {"id": "u1", "email": "admin@example.com",
                     "email_confirmed_at": "2024-05-01T10:00:00.123456Z"}
        }"#;
        let token: TokenResponse = serde_json::from_str(raw).unwrap();
        let session = token.into_session(1_000).unwrap();
        assert_eq!(session.expires_at, 4_600);
        assert!(session.user.is_email_verified());
        assert_eq!(session.refresh_token.unwrap().expose_secret(), "r");
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let pending: SignUpResponse =
            serde_json::from_str(r#"{"id":"u9","email":"new@example.com"}"#).unwrap();
        assert!(matches!(pending, SignUpResponse::User(_)));

        let confirmed: SignUpResponse = serde_json::from_str(
            r#"{"access_token":"a","expires_at":4000000000,"user":{"id":"u9"}}"#,
        )
        .unwrap();
        assert!(matches!(confirmed, SignUpResponse::Session(_)));
    }

    #[test]
    fn test_error_bodies_and_mapping() {
        let gotrue: ErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        let message = gotrue.text().unwrap();
        assert!(matches!(
            auth_rejection(StatusCode::BAD_REQUEST, message),
            GateError::InvalidCredentials(m) if m == "Invalid login credentials"
        ));

        assert!(matches!(
            auth_rejection(StatusCode::BAD_REQUEST, "Email not confirmed".into()),
            GateError::EmailNotVerified
        ));
        assert!(matches!(
            auth_rejection(StatusCode::BAD_GATEWAY, "upstream".into()),
            GateError::AuthServiceUnavailable(_)
        ));

        let postgrest: ErrorBody = serde_json::from_str(
            r#"{"code":"42P01","message":"relation \"public.admins\" does not exist"}"#,
        )
        .unwrap();
        assert!(postgrest.text().unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_recover_adopts_fresh_session_without_network() {
        let backend = backend();
        assert!(backend.recover(None).await.unwrap().is_none());

        let stored = session_expiring_in(3600);
        let recovered = backend.recover(Some(stored.clone())).await.unwrap();
        assert_eq!(recovered, Some(stored.clone()));
        assert_eq!(backend.current_session(), Some(stored.clone()));

        let mut sub = backend.subscribe();
        let initial = sub.next().await.unwrap();
        assert_eq!(initial.session, Some(stored));
    }

    #[tokio::test]
    async fn test_recover_drops_expiring_session_without_refresh_token() {
        let backend = backend();
        let recovered = backend.recover(Some(session_expiring_in(10))).await.unwrap();
        assert!(recovered.is_none());
        assert!(backend.current_session().is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_session_is_rejected() {
        let err = backend().refresh_session().await.unwrap_err();
        assert!(matches!(err, GateError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn test_expire_session_announces_sign_out() {
        let backend = backend();
        let stored = session_expiring_in(3600);
        backend.recover(Some(stored.clone())).await.unwrap();
        let mut sub = backend.subscribe();
        sub.next().await.unwrap();

        assert!(!backend.expire_session(&session_expiring_in(7200)));
        assert!(backend.expire_session(&stored));
        let change = sub.next().await.unwrap();
        assert_eq!(change.event, AuthEvent::SignedOut);
        assert!(backend.current_session().is_none());
    }
}
