//! Gateway shared state

use wagate_core::Coordinator;

/// Shared application state for the gateway routes
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
}

impl AppState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }
}
