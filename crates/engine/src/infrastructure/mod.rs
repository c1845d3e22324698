//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod cache;
pub mod clock;
pub mod memory;
pub mod narrative;
pub mod notify;
pub mod ports;
pub mod resilient_narrative;
pub mod settings;
