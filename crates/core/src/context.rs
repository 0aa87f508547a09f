//! Per-invocation carriers.
//!
//! An [`InvocationContext`] is created by whoever starts a run and travels
//! down the agent tree; composites hand each child its own copy. A
//! [`ToolContext`] wraps it for a single tool call.

use crate::{Memory, Message, RunConfig, auth::AuthHandler};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};
use ulid::Ulid;

/// Context for one invocation of an agent.
#[derive(Clone)]
pub struct InvocationContext {
    /// Unique id of the invocation.
    pub invocation_id: Ulid,

    /// The session the invocation belongs to.
    pub session_id: Option<String>,

    /// Runtime behavior.
    pub config: RunConfig,

    /// Conversation history handed to the agent.
    pub messages: Vec<Message>,

    /// Authentication handle passed on to tools.
    pub auth: Option<Arc<AuthHandler>>,

    /// Session memory, appended to as turns complete.
    pub memory: Option<Arc<dyn Memory>>,

    /// Whether an enclosing loop accepts an exit signal.
    pub looping: bool,
}

impl InvocationContext {
    /// Create a context for `messages` with default configuration.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            invocation_id: Ulid::new(),
            session_id: None,
            config: RunConfig::default(),
            messages,
            auth: None,
            memory: None,
            looping: false,
        }
    }

    /// Set the session id.
    pub fn session(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Set the run configuration.
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the authentication handle.
    pub fn auth(mut self, auth: Arc<AuthHandler>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the session memory.
    pub fn memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Copy of this context for a child run over `messages`.
    pub fn fork(&self, messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..self.clone()
        }
    }

    /// Record a completed turn in session memory, if any.
    pub fn remember(&self, message: &Message) {
        if let (Some(memory), Some(session)) = (&self.memory, &self.session_id) {
            memory.append(session, message.clone());
        }
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("invocation_id", &self.invocation_id)
            .field("session_id", &self.session_id)
            .field("messages", &self.messages.len())
            .field("looping", &self.looping)
            .finish()
    }
}

/// Context for one tool call.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// The invocation that issued the call.
    pub invocation: InvocationContext,

    /// Authentication handle for the tool.
    pub auth: Option<Arc<AuthHandler>>,

    /// Free-form parameters.
    pub parameters: Map<String, Value>,
}

impl ToolContext {
    /// Create a tool context, inheriting the invocation's auth handle.
    pub fn new(invocation: InvocationContext) -> Self {
        let auth = invocation.auth.clone();
        Self {
            invocation,
            auth,
            parameters: Map::new(),
        }
    }

    /// Get a parameter, deserialized as `T`.
    pub fn parameter<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.parameters
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get a parameter or the given default.
    pub fn parameter_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        self.parameter(name).unwrap_or(default)
    }

    /// Set a parameter.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.parameters.insert(name.into(), value);
    }
}
