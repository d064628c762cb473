//! Application Configuration
//!
//! Configuration for the session gate.

use std::time::Duration;

/// Storage key of the gate-owned session envelope
pub const DEFAULT_STORAGE_KEY: &str = "admin-console.session";

/// Session gate configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// A persisted session must outlive now + margin to be restored (60 seconds)
    pub optimistic_margin: Duration,
    /// How long a visitor without a usable local session waits before being
    /// shown as a guest (1 second)
    pub guest_timeout: Duration,
    /// Key of the session envelope in local storage
    pub storage_key: String,
    /// Whether authoritative sessions are written to local storage
    pub persist_sessions: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            optimistic_margin: Duration::from_secs(60),
            guest_timeout: Duration::from_secs(1),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            persist_sessions: true,
        }
    }
}

impl GateConfig {
    /// Config with a custom storage key, e.g. one per backend project
    pub fn with_storage_key(key: impl Into<String>) -> Self {
        Self {
            storage_key: key.into(),
            ..Default::default()
        }
    }

    /// Config for development: slower guest fallback so a local backend
    /// can answer first
    pub fn development() -> Self {
        Self {
            guest_timeout: Duration::from_secs(3),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.optimistic_margin, Duration::from_secs(60));
        assert_eq!(config.guest_timeout, Duration::from_secs(1));
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert!(config.persist_sessions);
    }

    #[test]
    fn test_with_storage_key_keeps_timings() {
        let config = GateConfig::with_storage_key("project-a.session");
        assert_eq!(config.storage_key, "project-a.session");
        assert_eq!(config.guest_timeout, Duration::from_secs(1));
    }
}
