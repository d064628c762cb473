//! Check Admin Use Case
//!
//! Passive admin re-verification. Fails closed: any lookup error counts as
//! "not an admin" and is never returned to the caller.

use std::sync::Arc;

use crate::domain::repository::AdminDirectory;
use crate::domain::value_object::subject_id::SubjectId;

pub struct CheckAdminUseCase<D>
where
    D: AdminDirectory,
{
    directory: Arc<D>,
}

impl<D> CheckAdminUseCase<D>
where
    D: AdminDirectory,
{
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    pub async fn execute(&self, subject: &SubjectId) -> bool {
        match self.directory.exists(subject).await {
            Ok(is_admin) => {
                tracing::debug!(subject = %subject, is_admin, "Admin lookup completed");
                is_admin
            }
            Err(e) => {
                tracing::warn!(
                    subject = %subject,
                    error = %e,
                    "Admin lookup failed, treating as non-admin"
                );
                false
            }
        }
    }
}
