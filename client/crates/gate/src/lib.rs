//! Session Gate for the admin console
//!
//! Clean Architecture structure:
//! - `domain/` - Session and gate state entities, value objects, collaborator traits
//! - `application/` - Use cases and the session gate itself
//! - `infra/` - HTTP backend, in-memory collaborators, session persistence
//! - `presentation/` - Views, route guards, state watcher
//!
//! ## Features
//! - Optimistic hydration from a persisted session, so a reload shows the
//!   dashboard immediately
//! - Background re-verification against the admin directory
//! - Auth service notifications always win over optimistic state
//! - Guest fallback after a short timeout when nothing can be restored
//! - Sessions refreshed before they run out, and signed out once they cannot be
//!
//! ## Security Model
//! - The optimistic admin flag is display-only; irreversible actions require
//!   a confirmed admin
//! - Admin lookups fail closed
//! - Sign-in is rejected, and the account signed back out, without a
//!   verified email and an admin directory record

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::{AutoRefresh, GateConfig, SessionGate};
pub use domain::{AdminFlag, AuthEvent, AuthUser, GatePhase, GateState, Session};
pub use error::{GateError, GateResult};
pub use presentation::{Access, AuthGuard, AuthView, GateWatcher, GuestGuard};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
