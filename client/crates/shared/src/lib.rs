//! Shared Kernel
//!
//! Vocabulary shared by every console crate:
//! - the unified error type ([`error::app_error::AppError`]) and its result alias
//! - the error classification ([`error::kind::ErrorKind`])
//! - conversions from the error types the console crates meet at their edges
//!
//! Only things whose meaning is the same across all features belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
