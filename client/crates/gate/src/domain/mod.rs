//! Domain Layer
//!
//! Contains entities, value objects, and collaborator traits.

pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{
    auth_change::{AuthChange, AuthEvent, AuthSubscription},
    gate_state::{AdminFlag, GatePhase, GateState, StateSource},
    session::{AuthUser, Session},
};
pub use repository::{AdminDirectory, AuthService, SessionStore, SignUpOutcome};
