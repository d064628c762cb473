//! Gate Watcher

use tokio::sync::watch;

use super::view::AuthView;
use crate::domain::entity::gate_state::GateState;

/// Subscription to gate state changes.
///
/// Intermediate states may be skipped; a watcher always sees the latest one.
/// Every method returns `None` once the gate has been dropped.
#[derive(Debug, Clone)]
pub struct GateWatcher {
    receiver: watch::Receiver<GateState>,
}

impl GateWatcher {
    pub fn new(receiver: watch::Receiver<GateState>) -> Self {
        Self { receiver }
    }

    pub fn snapshot(&self) -> GateState {
        self.receiver.borrow().clone()
    }

    pub fn view(&self) -> AuthView {
        AuthView::from(&*self.receiver.borrow())
    }

    /// Wait for the next change
    pub async fn changed(&mut self) -> Option<GateState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until `predicate` holds, checking the current state first
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&GateState) -> bool,
    ) -> Option<GateState> {
        let state = self.receiver.wait_for(|s| predicate(s)).await.ok()?;
        Some(state.clone())
    }

    /// Wait until loading is over
    pub async fn settled(&mut self) -> Option<GateState> {
        self.wait_for(|s| !s.loading).await
    }
}
