//! Inbound chat message use cases.

use std::sync::Arc;

mod command;
mod handle_message;

pub use command::{Command, CreateArgs};
pub use handle_message::{HandleMessage, HandleMessageError, Reply};

/// Container for message use cases.
pub struct MessageUseCases {
    pub handle: Arc<HandleMessage>,
}

impl MessageUseCases {
    pub fn new(handle: Arc<HandleMessage>) -> Self {
        Self { handle }
    }
}
