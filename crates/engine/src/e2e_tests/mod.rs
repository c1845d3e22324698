//! Engine E2E tests.
//!
//! These tests drive the complete `App` over the in-memory adapters:
//! - In-memory character and intervention stores
//! - The TTL session cache on a manually advanced clock
//! - Recording and failing notification channels over the template narrator
//!
//! # Running E2E Tests
//!
//! ```bash
//! cargo test -p chatgm-engine --lib e2e_tests
//! ```

mod e2e_helpers;
mod session_tests;

pub use e2e_helpers::*;
