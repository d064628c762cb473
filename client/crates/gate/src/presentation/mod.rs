//! Presentation Layer
//!
//! What the console's screens consume: state snapshots, route guards and a
//! change watcher.

pub mod guard;
pub mod view;
pub mod watcher;

pub use guard::{Access, AuthGuard, GuestGuard, Redirect, require_confirmed_admin};
pub use view::AuthView;
pub use watcher::GateWatcher;
