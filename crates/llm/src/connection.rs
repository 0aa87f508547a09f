//! Duplex connections.

use acore::{Error, Response};
use anyhow::Result;
use parking_lot::RwLock;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::mpsc;

/// Called with each response the backend produces.
pub type OnResponse = Box<dyn Fn(Response) + Send + Sync>;

/// Called when the backend fails.
pub type OnError = Box<dyn Fn(&anyhow::Error) + Send + Sync>;

/// Called when the backend ends the conversation.
pub type OnEnd = Box<dyn Fn() + Send + Sync>;

/// A live bidirectional session with a backend.
///
/// A connection starts active. After [`Connection::close`] it is inactive
/// for good: sends fail with [`Error::ConnectionClosed`] and no further
/// callbacks fire.
pub trait Connection: Send + Sync {
    /// Send a user turn and ask for the reply.
    fn send(&self, text: &str) -> Result<()>;

    /// Ask for a reply to the conversation as it stands, without adding a
    /// user turn. Used after tool results, which are already part of the
    /// history the connection was opened with.
    fn respond(&self) -> Result<()>;

    /// Register a response callback.
    fn on_response(&self, callback: OnResponse);

    /// Register an error callback.
    fn on_error(&self, callback: OnError);

    /// Register an end-of-conversation callback.
    fn on_end(&self, callback: OnEnd);

    /// Close the connection. Idempotent.
    fn close(&self);

    /// Whether the connection is still open.
    fn is_active(&self) -> bool;
}

/// Callback lists and the liveness flag, for connection implementations.
#[derive(Default)]
pub struct Callbacks {
    closed: AtomicBool,
    responses: RwLock<Vec<Arc<dyn Fn(Response) + Send + Sync>>>,
    errors: RwLock<Vec<Arc<dyn Fn(&anyhow::Error) + Send + Sync>>>,
    ends: RwLock<Vec<Arc<dyn Fn() + Send + Sync>>>,
}

impl Callbacks {
    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Fail with [`Error::ConnectionClosed`] once closed.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::ConnectionClosed.into())
        }
    }

    /// Mark the connection closed. Returns `true` only for the first call.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn add_response(&self, callback: OnResponse) {
        self.responses.write().push(Arc::from(callback));
    }

    pub fn add_error(&self, callback: OnError) {
        self.errors.write().push(Arc::from(callback));
    }

    pub fn add_end(&self, callback: OnEnd) {
        self.ends.write().push(Arc::from(callback));
    }

    /// Deliver a response to every callback.
    pub fn response(&self, response: Response) {
        if !self.is_active() {
            return;
        }
        let callbacks = self.responses.read().clone();
        for callback in callbacks {
            callback(response.clone());
        }
    }

    /// Deliver an error to every callback.
    pub fn error(&self, err: &anyhow::Error) {
        if !self.is_active() {
            return;
        }
        let callbacks = self.errors.read().clone();
        for callback in callbacks {
            callback(err);
        }
    }

    /// Signal the end of the conversation.
    pub fn end(&self) {
        if !self.is_active() {
            return;
        }
        let callbacks = self.ends.read().clone();
        for callback in callbacks {
            callback();
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("active", &self.is_active())
            .field("responses", &self.responses.read().len())
            .field("errors", &self.errors.read().len())
            .field("ends", &self.ends.read().len())
            .finish()
    }
}

/// One event observed on a connection.
#[derive(Debug)]
pub enum Signal {
    Response(Response),
    Error(anyhow::Error),
    End,
}

/// Bridge a connection's callbacks into a channel.
pub fn subscribe(connection: &dyn Connection) -> mpsc::UnboundedReceiver<Signal> {
    let (tx, rx) = mpsc::unbounded_channel();

    let responses = tx.clone();
    connection.on_response(Box::new(move |response| {
        let _ = responses.send(Signal::Response(response));
    }));

    let errors = tx.clone();
    connection.on_error(Box::new(move |err| {
        let _ = errors.send(Signal::Error(anyhow::anyhow!("{err:#}")));
    }));

    connection.on_end(Box::new(move || {
        let _ = tx.send(Signal::End);
    }));
    rx
}
