//! Intervention use cases.

use std::sync::Arc;

mod resolve;

pub use resolve::{ResolveIntervention, ResolveInterventionError, ResolvedIntervention};

/// Container for intervention use cases.
pub struct InterventionUseCases {
    pub resolve: Arc<ResolveIntervention>,
}

impl InterventionUseCases {
    pub fn new(resolve: Arc<ResolveIntervention>) -> Self {
        Self { resolve }
    }
}
