//! Session memory.
//!
//! Storage is an external collaborator consumed through two operations:
//! append a completed turn, and query a session's history. [`InMemory`]
//! is the bundled implementation.

pub use mem::InMemory;

use crate::Message;

mod mem;

/// A session store.
pub trait Memory: Send + Sync {
    /// Append a completed turn to `session`.
    fn append(&self, session: &str, message: Message);

    /// All turns recorded for `session`, in append order.
    fn history(&self, session: &str) -> Vec<Message>;
}
