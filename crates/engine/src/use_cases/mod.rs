//! Use cases - User story orchestration.
//!
//! Each module contains use cases for a specific domain area.
//! Use cases orchestrate across entity modules to fulfill user stories.

pub mod character;
pub mod intervention;
pub mod message;

// Re-export main types
pub use character::CharacterUseCases;
pub use intervention::InterventionUseCases;
pub use message::MessageUseCases;
