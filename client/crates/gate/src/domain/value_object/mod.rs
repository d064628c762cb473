//! Value Object Module

pub mod credentials;
pub mod email;
pub mod subject_id;
