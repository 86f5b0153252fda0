//! Navigation thread: patrol loop plus action execution.

use std::sync::Arc;

use crate::navigation::NavigationLoop;
use crate::shared::SharedState;

/// Navigation thread state and logic.
pub struct NavigationThread {
    nav: NavigationLoop,
    shared_state: Arc<SharedState>,
}

impl NavigationThread {
    pub fn new(nav: NavigationLoop, shared_state: Arc<SharedState>) -> Self {
        Self { nav, shared_state }
    }

    /// Run the patrol. A fatal fault shuts the whole pipeline down.
    pub fn run(&mut self) {
        tracing::info!("Navigation thread started");
        if let Err(e) = self.nav.run(&self.shared_state) {
            tracing::error!("Navigation thread error: {}", e);
            self.shared_state.trigger_fault(e.to_string());
        }
    }
}
