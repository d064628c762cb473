//! Application Layer
//!
//! Use cases and the session gate that drives them.

pub mod auto_refresh;
pub mod check_admin;
pub mod config;
pub mod gate;
pub mod restore_session;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;

// Re-exports
pub use auto_refresh::{AutoRefresh, DEFAULT_REFRESH_MARGIN};
pub use check_admin::CheckAdminUseCase;
pub use config::{DEFAULT_STORAGE_KEY, GateConfig};
pub use gate::SessionGate;
pub use restore_session::RestoreSessionUseCase;
pub use sign_in::{SignInInput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpUseCase};
