// Port traits define the full contract - many methods are for future use
#![allow(dead_code)]

//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Record storage (characters, interventions)
//! - The expiring session cache
//! - Narrative text generation
//! - Notification channels
//! - Clock/Random (for testing)

mod error;
mod external;
mod repos;
mod testing;
pub mod types;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::*;

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::*;

pub use types::{ChannelOutcome, ConstraintRules, NarrativeContext, NarrativePurpose};

// =============================================================================
// Error Types
// =============================================================================
pub use error::{CacheError, NarrativeError, NotifyError, RepoError, UniqueConstraint};

// =============================================================================
// Testability Ports
// =============================================================================
pub use testing::*;
