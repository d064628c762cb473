//! Gate State
//!
//! Derived, in-memory view of "who is here and may they administer".
//! Only the session gate mutates it; everyone else reads snapshots.

use super::session::{AuthUser, Session};
use crate::domain::value_object::subject_id::SubjectId;

/// Administrator flag.
///
/// `Optimistic` and `Granted` both display as admin, but only `Granted` came
/// from a directory lookup tied to a session the auth service delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum AdminFlag {
    #[default]
    #[display("unknown")]
    Unknown,
    #[display("optimistic")]
    Optimistic,
    #[display("granted")]
    Granted,
    #[display("denied")]
    Denied,
}

impl AdminFlag {
    /// Display value: true for both optimistic and confirmed admins
    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, AdminFlag::Optimistic | AdminFlag::Granted)
    }

    #[inline]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, AdminFlag::Granted)
    }

    /// Tri-state view: `None` while unknown
    #[inline]
    pub const fn as_tri_state(&self) -> Option<bool> {
        match self {
            AdminFlag::Unknown => None,
            AdminFlag::Optimistic | AdminFlag::Granted => Some(true),
            AdminFlag::Denied => Some(false),
        }
    }
}

/// Which trigger last wrote `user`/`session`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum StateSource {
    #[default]
    #[display("initial")]
    Initial,
    /// Restored from local persistence, not yet confirmed
    #[display("optimistic")]
    Optimistic,
    /// Guest timeout gave up waiting
    #[display("timeout")]
    Timeout,
    /// Auth service notification or completed sign-in
    #[display("authoritative")]
    Authoritative,
}

/// State machine position, derived from the fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum GatePhase {
    Unknown,
    OptimisticAdmin,
    ConfirmedAdmin,
    ConfirmedGuest,
    #[display("Guest(timeout)")]
    GuestTimeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateState {
    pub session: Option<Session>,
    pub user: Option<AuthUser>,
    pub admin: AdminFlag,
    pub loading: bool,
    pub source: StateSource,
}

impl Default for GateState {
    fn default() -> Self {
        Self {
            session: None,
            user: None,
            admin: AdminFlag::Unknown,
            loading: true,
            source: StateSource::Initial,
        }
    }
}

impl GateState {
    /// Display-level admin check, includes the optimistic window
    pub fn is_admin(&self) -> bool {
        self.user.is_some() && self.admin.is_admin()
    }

    /// Access-control admin check
    pub fn is_confirmed_admin(&self) -> bool {
        self.user.is_some() && self.admin.is_confirmed()
    }

    /// Whether `subject` is the user currently held
    pub fn holds(&self, subject: &SubjectId) -> bool {
        self.user.as_ref().is_some_and(|u| &u.id == subject)
    }

    pub fn phase(&self) -> GatePhase {
        if self.user.is_some() {
            match self.admin {
                AdminFlag::Granted => return GatePhase::ConfirmedAdmin,
                AdminFlag::Optimistic => return GatePhase::OptimisticAdmin,
                _ => {}
            }
        }
        if self.loading {
            GatePhase::Unknown
        } else if self.source == StateSource::Timeout {
            GatePhase::GuestTimeout
        } else {
            GatePhase::ConfirmedGuest
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> AuthUser {
        AuthUser::new(SubjectId::new("u1").unwrap())
    }

    #[test]
    fn test_initial_state_is_unknown_and_loading() {
        let state = GateState::default();
        assert!(state.loading);
        assert_eq!(state.phase(), GatePhase::Unknown);
        assert_eq!(state.admin.as_tri_state(), None);
        assert!(!state.is_admin());
    }

    #[test]
    fn test_optimistic_is_displayed_but_not_confirmed() {
        let state = GateState {
            user: Some(user()),
            admin: AdminFlag::Optimistic,
            loading: false,
            source: StateSource::Optimistic,
            ..GateState::default()
        };
        assert_eq!(state.phase(), GatePhase::OptimisticAdmin);
        assert!(state.is_admin());
        assert!(!state.is_confirmed_admin());
    }

    #[test]
    fn test_granted_is_confirmed() {
        let state = GateState {
            user: Some(user()),
            admin: AdminFlag::Granted,
            loading: false,
            source: StateSource::Authoritative,
            ..GateState::default()
        };
        assert_eq!(state.phase(), GatePhase::ConfirmedAdmin);
        assert!(state.is_confirmed_admin());
        assert!(state.holds(&SubjectId::new("u1").unwrap()));
        assert!(!state.holds(&SubjectId::new("u2").unwrap()));
    }

    #[test]
    fn test_guest_phases() {
        let timeout = GateState {
            admin: AdminFlag::Denied,
            loading: false,
            source: StateSource::Timeout,
            ..GateState::default()
        };
        assert_eq!(timeout.phase(), GatePhase::GuestTimeout);
        assert_eq!(timeout.phase().to_string(), "Guest(timeout)");

        let signed_in_non_admin = GateState {
            user: Some(user()),
            admin: AdminFlag::Denied,
            loading: false,
            source: StateSource::Authoritative,
            ..GateState::default()
        };
        assert_eq!(signed_in_non_admin.phase(), GatePhase::ConfirmedGuest);
    }

    #[test]
    fn test_admin_flag_without_user_is_not_admin() {
        let state = GateState {
            admin: AdminFlag::Granted,
            loading: false,
            ..GateState::default()
        };
        assert!(!state.is_admin());
        assert_ne!(state.phase(), GatePhase::ConfirmedAdmin);
    }
}
