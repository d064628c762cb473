//! Sign Out Use Case
//!
//! Asks the auth service to end the session. Gate state is cleared by the
//! resulting `SIGNED_OUT` notification, not here.

use std::sync::Arc;

use crate::domain::repository::AuthService;
use crate::error::GateResult;

pub struct SignOutUseCase<A>
where
    A: AuthService,
{
    auth: Arc<A>,
}

impl<A> SignOutUseCase<A>
where
    A: AuthService,
{
    pub fn new(auth: Arc<A>) -> Self {
        Self { auth }
    }

    pub async fn execute(&self) -> GateResult<()> {
        self.auth.sign_out().await?;
        tracing::info!("Sign-out requested");
        Ok(())
    }
}
