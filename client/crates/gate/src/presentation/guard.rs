//! Route Guards
//!
//! Access decisions for the console's screens. Guards read the display flag,
//! so an optimistic admin gets in immediately; anything irreversible must go
//! through [`require_confirmed_admin`] instead.

use crate::domain::entity::gate_state::{AdminFlag, GateState};
use crate::domain::entity::session::AuthUser;
use crate::error::{GateError, GateResult};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Sign in, then come back to `from`
    Login { from: String },
    Dashboard,
}

impl Redirect {
    pub fn path(&self) -> &'static str {
        match self {
            Redirect::Login { .. } => LOGIN_PATH,
            Redirect::Dashboard => DASHBOARD_PATH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Still loading, show a placeholder
    Pending,
    Allow,
    Redirect(Redirect),
}

/// Guard for admin-only screens
pub struct AuthGuard;

impl AuthGuard {
    pub fn check(state: &GateState, location: &str) -> Access {
        if state.loading {
            return Access::Pending;
        }
        if !state.is_admin() {
            return Access::Redirect(Redirect::Login {
                from: location.to_owned(),
            });
        }
        Access::Allow
    }
}

/// Guard for the sign-in screen: admins are sent on to the dashboard
pub struct GuestGuard;

impl GuestGuard {
    pub fn check(state: &GateState) -> Access {
        if state.loading {
            return Access::Pending;
        }
        if state.is_admin() {
            return Access::Redirect(Redirect::Dashboard);
        }
        Access::Allow
    }
}

/// The current user, if the admin directory has confirmed them.
pub fn require_confirmed_admin(state: &GateState) -> GateResult<&AuthUser> {
    let user = state.user.as_ref().ok_or(GateError::NotAuthorized)?;
    match state.admin {
        AdminFlag::Granted => Ok(user),
        AdminFlag::Optimistic | AdminFlag::Unknown => Err(GateError::AdminConfirmationPending),
        AdminFlag::Denied => Err(GateError::NotAuthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::gate_state::StateSource;
    use crate::domain::value_object::subject_id::SubjectId;

    fn with_admin(admin: AdminFlag) -> GateState {
        GateState {
            user: Some(AuthUser::new(SubjectId::new("u1").unwrap())),
            admin,
            loading: false,
            source: StateSource::Authoritative,
            ..GateState::default()
        }
    }

    #[test]
    fn test_guards_wait_while_loading() {
        let state = GateState::default();
        assert_eq!(AuthGuard::check(&state, "/orders"), Access::Pending);
        assert_eq!(GuestGuard::check(&state), Access::Pending);
    }

    #[test]
    fn test_auth_guard_redirects_non_admins_to_login() {
        let guest = GateState {
            loading: false,
            ..GateState::default()
        };
        let access = AuthGuard::check(&guest, "/orders");
        assert_eq!(
            access,
            Access::Redirect(Redirect::Login {
                from: "/orders".into()
            })
        );

        let denied = with_admin(AdminFlag::Denied);
        assert!(matches!(
            AuthGuard::check(&denied, "/"),
            Access::Redirect(Redirect::Login { .. })
        ));
        assert_eq!(GuestGuard::check(&denied), Access::Allow);
    }

    #[test]
    fn test_optimistic_admin_passes_guards() {
        let optimistic = with_admin(AdminFlag::Optimistic);
        assert_eq!(AuthGuard::check(&optimistic, "/users"), Access::Allow);
        assert_eq!(
            GuestGuard::check(&optimistic),
            Access::Redirect(Redirect::Dashboard)
        );
        assert_eq!(Redirect::Dashboard.path(), DASHBOARD_PATH);
    }

    #[test]
    fn test_irreversible_actions_need_confirmation() {
        assert!(matches!(
            require_confirmed_admin(&with_admin(AdminFlag::Optimistic)),
            Err(GateError::AdminConfirmationPending)
        ));
        assert!(matches!(
            require_confirmed_admin(&with_admin(AdminFlag::Denied)),
            Err(GateError::NotAuthorized)
        ));
        assert!(matches!(
            require_confirmed_admin(&GateState::default()),
            Err(GateError::NotAuthorized)
        ));

        let granted = with_admin(AdminFlag::Granted);
        assert_eq!(require_confirmed_admin(&granted).unwrap().id.as_str(), "u1");
    }
}
