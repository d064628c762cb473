//! Auth View
//!
//! Flat snapshot of the gate state in the shape screens render from.

use serde::Serialize;

use crate::domain::entity::gate_state::{GatePhase, GateState};
use crate::domain::entity::session::AuthUser;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthView {
    pub user: Option<AuthUser>,
    pub has_session: bool,
    /// Display flag; true during the optimistic window too
    pub is_admin: bool,
    /// Only true once the admin directory confirmed a delivered session
    pub is_confirmed_admin: bool,
    pub loading: bool,
    pub phase: String,
}

impl AuthView {
    pub fn phase_is(&self, phase: GatePhase) -> bool {
        self.phase == phase.to_string()
    }
}

impl From<&GateState> for AuthView {
    fn from(state: &GateState) -> Self {
        Self {
            user: state.user.clone(),
            has_session: state.session.is_some(),
            is_admin: state.is_admin(),
            is_confirmed_admin: state.is_confirmed_admin(),
            loading: state.loading,
            phase: state.phase().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::gate_state::AdminFlag;
    use crate::domain::value_object::subject_id::SubjectId;

    #[test]
    fn test_view_serializes_without_tokens() {
        let state = GateState {
            user: Some(AuthUser::new(SubjectId::new("u1").unwrap()).with_email("a@example.com")),
            admin: AdminFlag::Optimistic,
            loading: false,
            ..GateState::default()
        };
        let view = AuthView::from(&state);
        assert!(view.is_admin);
        assert!(!view.is_confirmed_admin);
        assert!(view.phase_is(GatePhase::OptimisticAdmin));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["user"]["id"], "u1");
        assert_eq!(json["phase"], "OptimisticAdmin");
        assert!(json.get("access_token").is_none());
    }
}
