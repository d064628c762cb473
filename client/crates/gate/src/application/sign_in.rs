//! Sign In Use Case
//!
//! Authenticates with the auth service, then enforces the console's own
//! gates: a confirmed email and an admin directory record. Any failed gate
//! signs the account straight back out.

use std::sync::Arc;

use platform::secret::SecretString;

use crate::domain::entity::session::Session;
use crate::domain::repository::{AdminDirectory, AuthService};
use crate::domain::value_object::credentials::Credentials;
use crate::error::{GateError, GateResult};

/// Sign in input
pub struct SignInInput {
    pub email: String,
    pub password: SecretString,
}

/// Sign in use case
pub struct SignInUseCase<A, D>
where
    A: AuthService,
    D: AdminDirectory,
{
    auth: Arc<A>,
    directory: Arc<D>,
}

impl<A, D> SignInUseCase<A, D>
where
    A: AuthService,
    D: AdminDirectory,
{
    pub fn new(auth: Arc<A>, directory: Arc<D>) -> Self {
        Self { auth, directory }
    }

    /// Returns the session only once both gates passed.
    ///
    /// A directory failure is reported as `GateError::DirectoryUnavailable`,
    /// never folded into `GateError::NotAuthorized`.
    pub async fn execute(&self, input: SignInInput) -> GateResult<Session> {
        let credentials = Credentials::new(&input.email, input.password)?;

        let session = self.auth.sign_in_with_password(&credentials).await?;
        let subject = session.subject().clone();

        if !session.user.is_email_verified() {
            self.revoke().await;
            return Err(GateError::EmailNotVerified);
        }

        match self.directory.exists(&subject).await {
            Ok(true) => {}
            Ok(false) => {
                self.revoke().await;
                return Err(GateError::NotAuthorized);
            }
            Err(e) => {
                self.revoke().await;
                return Err(match e {
                    GateError::DirectoryUnavailable(msg) => GateError::DirectoryUnavailable(msg),
                    other => GateError::DirectoryUnavailable(other.to_string()),
                });
            }
        }

        tracing::info!(
            subject = %subject,
            email = %credentials.email,
            "Admin signed in"
        );

        Ok(session)
    }

    /// Undo the auth service sign-in after a failed gate.
    ///
    /// The gate error is what the caller needs to see, so a failing sign-out
    /// is only logged.
    async fn revoke(&self) {
        if let Err(e) = self.auth.sign_out().await {
            tracing::warn!(error = %e, "Failed to revoke session after rejected sign-in");
        }
    }
}
