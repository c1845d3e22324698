//! In-process storage implementations.
//!
//! Records are kept in their versioned wire form so every read goes
//! through the same decode path a durable store would.

use std::sync::Arc;

mod character_repo;
mod intervention_repo;

pub use character_repo::InMemoryCharacterRepo;
pub use intervention_repo::InMemoryInterventionRepo;

/// Create all in-memory repositories.
pub struct InMemoryRepositories {
    pub character: Arc<InMemoryCharacterRepo>,
    pub intervention: Arc<InMemoryInterventionRepo>,
}

impl InMemoryRepositories {
    pub fn new(intervention_history_capacity: usize) -> Self {
        Self {
            character: Arc::new(InMemoryCharacterRepo::new()),
            intervention: Arc::new(InMemoryInterventionRepo::new(intervention_history_capacity)),
        }
    }
}
