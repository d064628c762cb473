//! Infrastructure Layer
//!
//! Collaborator implementations: the hosted HTTP backend, in-memory
//! stand-ins, and session persistence over local storage.

pub mod http;
pub mod hub;
pub mod memory;
pub mod session_store;

pub use http::{BackendConfig, HttpBackend};
pub use hub::SessionHub;
pub use memory::{InMemoryAdminDirectory, InMemoryAuthService};
pub use session_store::KeyValueSessionStore;
