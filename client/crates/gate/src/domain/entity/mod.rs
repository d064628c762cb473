//! Entity Module

pub mod auth_change;
pub mod gate_state;
pub mod session;
