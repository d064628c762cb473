//! Sign Up Use Case
//!
//! Registers a new account with the auth service. Registration does not make
//! anyone an admin; that still takes an admin directory record.

use std::sync::Arc;

use platform::secret::SecretString;

use crate::domain::repository::{AuthService, SignUpOutcome};
use crate::domain::value_object::credentials::Credentials;
use crate::error::GateResult;

/// Sign up input
pub struct SignUpInput {
    pub email: String,
    pub password: SecretString,
}

pub struct SignUpUseCase<A>
where
    A: AuthService,
{
    auth: Arc<A>,
}

impl<A> SignUpUseCase<A>
where
    A: AuthService,
{
    pub fn new(auth: Arc<A>) -> Self {
        Self { auth }
    }

    pub async fn execute(&self, input: SignUpInput) -> GateResult<SignUpOutcome> {
        let credentials = Credentials::new(&input.email, input.password)?;
        let outcome = self.auth.sign_up(&credentials).await?;

        tracing::info!(
            subject = %outcome.user.id,
            confirmation_required = outcome.confirmation_required(),
            "Account signed up"
        );

        Ok(outcome)
    }
}
