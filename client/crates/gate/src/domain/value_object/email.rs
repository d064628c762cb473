//! Email Value Object
//!
//! Sign-in identifier. Only the shape is checked here; whether the address
//! has been confirmed is reported by the auth service on the user record.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{GateError, GateResult};

/// Maximum email length (per RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn new(email: impl AsRef<str>) -> GateResult<Self> {
        let email = email.as_ref().trim().to_lowercase();

        if email.is_empty() {
            return Err(GateError::InvalidEmail("email cannot be empty".into()));
        }
        if email.len() > EMAIL_MAX_LENGTH {
            return Err(GateError::InvalidEmail(format!(
                "email must be at most {EMAIL_MAX_LENGTH} characters"
            )));
        }
        if !Self::has_valid_shape(&email) {
            return Err(GateError::InvalidEmail(format!("{email:?} is not an address")));
        }

        Ok(Self(email))
    }

    fn has_valid_shape(email: &str) -> bool {
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };
        if local.is_empty() || local.len() > 64 || domain.contains('@') {
            return false;
        }
        if domain.is_empty() || !domain.contains('.') {
            return false;
        }
        if domain.starts_with(['.', '-']) || domain.ends_with(['.', '-']) {
            return false;
        }
        domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or("")
    }
}

impl FromStr for Email {
    type Err = GateError;

    fn from_str(s: &str) -> GateResult<Self> {
        Email::new(s)
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
