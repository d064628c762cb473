//! Platform Crate - Technical Infrastructure
//!
//! Technical foundations the console features build on:
//! - Durable local key/value storage (in-memory and file-backed)
//! - Secret strings that are redacted in logs and zeroized on drop

pub mod secret;
pub mod storage;
