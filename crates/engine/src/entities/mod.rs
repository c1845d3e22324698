//! Entity modules - Domain capability encapsulation.
//!
//! Each module wraps operations for a domain entity type.
//! They depend on repository ports and provide the building blocks for use cases.

pub mod character;
pub mod dice;
pub mod escalation;
pub mod intervention;
pub mod session;

pub use character::{Character, CharacterError, NameCheck};
pub use dice::Dice;
pub use escalation::{Assessment, Decision, Escalation, EscalationRules};
pub use intervention::{Intervention, InterventionError};
pub use session::{Session, SessionError};
