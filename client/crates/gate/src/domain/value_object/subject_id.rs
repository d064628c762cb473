//! Subject Identity
//!
//! The auth service's identifier for a signed-in account. The admin
//! directory is keyed by the same value.

use serde::{Deserialize, Serialize};

use crate::error::{GateError, GateResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> GateResult<Self> {
        let id = id.into();
        if id.trim().is_empty() || id.chars().any(char::is_control) {
            return Err(GateError::Internal(format!("Invalid subject id: {id:?}")));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubjectId {
    type Error = GateError;

    fn try_from(value: String) -> GateResult<Self> {
        Self::new(value)
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_id_rejects_blank() {
        assert!(SubjectId::new("").is_err());
        assert!(SubjectId::new("   ").is_err());
        assert!(SubjectId::new("u1\n").is_err());
        assert_eq!(SubjectId::new("u1").unwrap().as_str(), "u1");
    }

    #[test]
    fn test_subject_id_deserialize_validates() {
        let id: SubjectId = serde_json::from_str("\"u1\"").unwrap();
        assert_eq!(id.to_string(), "u1");
        assert!(serde_json::from_str::<SubjectId>("\"\"").is_err());
    }
}
