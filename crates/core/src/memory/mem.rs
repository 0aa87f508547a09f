//! In-memory implementation of the Memory trait.

use crate::{Message, memory::Memory};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// In-memory store backed by `Mutex<BTreeMap<session, Vec<Message>>>`.
#[derive(Default, Debug)]
pub struct InMemory {
    sessions: Mutex<BTreeMap<String, Vec<Message>>>,
}

impl InMemory {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every session with at least one turn.
    pub fn sessions(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }
}

impl Memory for InMemory {
    fn append(&self, session: &str, message: Message) {
        self.sessions
            .lock()
            .entry(session.to_owned())
            .or_default()
            .push(message);
    }

    fn history(&self, session: &str) -> Vec<Message> {
        self.sessions
            .lock()
            .get(session)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order_per_session() {
        let mem = InMemory::new();
        mem.append("a", Message::user("1"));
        mem.append("b", Message::user("x"));
        mem.append("a", Message::assistant("2"));

        let history = mem.history("a");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text(), "1");
        assert_eq!(history[1].text(), "2");
        assert_eq!(mem.sessions(), vec!["a".to_owned(), "b".to_owned()]);
        assert!(mem.history("missing").is_empty());
    }
}
