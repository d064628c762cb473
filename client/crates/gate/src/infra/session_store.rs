//! Persisted Session Store
//!
//! Keeps the last authoritative session in a key/value store as a versioned
//! JSON envelope:
//!
//! ```json
//! { "version": 1, "saved_at": 1735689600, "session": { ... } }
//! ```

use std::sync::Arc;

use chrono::Utc;
use platform::storage::KeyValueStore;
use serde::{Deserialize, Serialize};

use crate::domain::entity::session::Session;
use crate::domain::repository::SessionStore;
use crate::error::{GateError, GateResult};

/// Envelope version written by this build
pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    /// Unix seconds
    saved_at: i64,
    session: Session,
}

/// Version field alone, read before committing to the full envelope shape
#[derive(Deserialize)]
struct VersionOnly {
    version: u32,
}

/// [`SessionStore`] over any [`KeyValueStore`]
pub struct KeyValueSessionStore<K>
where
    K: KeyValueStore,
{
    storage: Arc<K>,
    key: String,
}

impl<K> KeyValueSessionStore<K>
where
    K: KeyValueStore,
{
    pub fn new(storage: Arc<K>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }
}

impl<K> SessionStore for KeyValueSessionStore<K>
where
    K: KeyValueStore + Send + Sync,
{
    async fn load(&self) -> GateResult<Option<Session>> {
        let Some(raw) = self.storage.get(&self.key).await? else {
            return Ok(None);
        };

        let header: VersionOnly = serde_json::from_str(&raw)
            .map_err(|e| GateError::MalformedLocalSession(e.to_string()))?;
        if header.version != ENVELOPE_VERSION {
            return Err(GateError::MalformedLocalSession(format!(
                "unsupported envelope version {}",
                header.version
            )));
        }

        let envelope: Envelope = serde_json::from_str(&raw)
            .map_err(|e| GateError::MalformedLocalSession(e.to_string()))?;
        Ok(Some(envelope.session))
    }

    async fn save(&self, session: &Session) -> GateResult<()> {
        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            saved_at: Utc::now().timestamp(),
            session: session.clone(),
        };
        let raw = serde_json::to_string(&envelope)
            .map_err(|e| GateError::Internal(format!("Failed to encode session: {e}")))?;

        self.storage.set(&self.key, &raw).await?;
        tracing::debug!(subject = %session.subject(), "Persisted session");
        Ok(())
    }

    async fn clear(&self) -> GateResult<()> {
        self.storage.remove(&self.key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use platform::storage::{FileStorage, MemoryStorage};

    use super::*;
    use crate::domain::entity::session::AuthUser;
    use crate::domain::value_object::subject_id::SubjectId;

    const KEY: &str = "admin-console.session";

    fn session() -> Session {
        Session::new(
            AuthUser::new(SubjectId::new("u1").unwrap()).with_email("admin@example.com"),
            4_000_000_000,
            "access",
        )
        .with_refresh_token("refresh")
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let store = KeyValueSessionStore::new(Arc::new(MemoryStorage::new()), KEY);
        assert!(store.load().await.unwrap().is_none());

        store.save(&session()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, session());
        assert_eq!(loaded.refresh_token.unwrap().expose_secret(), "refresh");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_envelope_survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let first = KeyValueSessionStore::new(Arc::new(FileStorage::new(dir.path())), KEY);
        first.save(&session()).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(KEY)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["session"]["user"]["id"], "u1");

        let second = KeyValueSessionStore::new(Arc::new(FileStorage::new(dir.path())), KEY);
        assert_eq!(second.load().await.unwrap(), Some(session()));
    }

    #[tokio::test]
    async fn test_garbage_and_unknown_versions_are_malformed() {
        for raw in [
            "not json",
            r#"{"version":2,"saved_at":1735689600,"session":{}}"#,
            r#"{"version":1,"saved_at":1735689600,"session":{"user":{}}}"#,
        ] {
            let store = KeyValueSessionStore::new(Arc::new(MemoryStorage::with_entry(KEY, raw)), KEY);
            assert!(matches!(
                store.load().await,
                Err(GateError::MalformedLocalSession(_))
            ));
        }
    }
}
