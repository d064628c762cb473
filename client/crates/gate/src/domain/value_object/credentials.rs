//! Credentials Value Object

use platform::secret::SecretString;

use super::email::Email;
use crate::error::{GateError, GateResult};

/// Email + password pair handed to the auth service.
///
/// Password policy belongs to the auth service; here it only has to be
/// present.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: Email,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl AsRef<str>, password: impl Into<SecretString>) -> GateResult<Self> {
        let email = Email::new(email)?;
        let password = password.into();
        if password.expose_secret().trim().is_empty() {
            return Err(GateError::MissingPassword);
        }
        Ok(Self { email, password })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_password() {
        assert!(matches!(
            Credentials::new("admin@example.com", "  "),
            Err(GateError::MissingPassword)
        ));
        assert!(matches!(
            Credentials::new("nope", "secret"),
            Err(GateError::InvalidEmail(_))
        ));
        let creds = Credentials::new("Admin@Example.com", "secret").unwrap();
        assert_eq!(creds.email.as_str(), "admin@example.com");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("admin@example.com", "correct horse").unwrap();
        assert!(!format!("{creds:?}").contains("correct horse"));
    }
}
