use std::collections::HashSet;

use crate::models::chat::Message;

/// Arrival-ordered messages of one conversation. Entries are never reordered;
/// a message whose id is already present is ignored.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    seen: HashSet<u64>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id was already in the log.
    pub fn append(&mut self, message: Message) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
