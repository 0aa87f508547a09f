//! Error taxonomy shared across the engine.
//!
//! Execution paths return [`anyhow::Result`]; the variants below are the
//! typed failures callers may want to match on via
//! `err.downcast_ref::<Error>()`.

use thiserror::Error as ThisError;

/// A typed engine failure.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    /// The agent name is not an identifier.
    #[error("invalid agent name '{0}': agent names must be valid identifiers")]
    InvalidName(String),

    /// The agent name is reserved for end-user input.
    #[error("agent name cannot be '{0}', it is reserved for end-user input")]
    ReservedName(String),

    /// The agent already belongs to a tree.
    #[error("agent '{agent}' already has parent '{parent}', an agent can only be attached once")]
    AlreadyParented { agent: String, parent: String },

    /// Attaching would make an agent its own ancestor.
    #[error("attaching '{agent}' under '{parent}' would create a cycle")]
    Cycle { agent: String, parent: String },

    /// A sibling with the same name already exists.
    #[error("agent '{parent}' already has a child named '{agent}'")]
    DuplicateSiblingName { parent: String, agent: String },

    /// No registered pattern matches the model identifier.
    #[error("no provider registered for model '{0}'")]
    UnresolvedModel(String),

    /// A registry pattern failed to compile.
    #[error("invalid model pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The backend returned no usable choice.
    #[error("empty response from model '{model}'")]
    EmptyResponse { model: String },

    /// The credential cannot refresh its token.
    #[error("token refresh not supported for {0} credentials")]
    RefreshUnsupported(String),

    /// The agent hit its tool round cap within one turn.
    #[error("agent '{agent}' reached the maximum of {rounds} tool rounds")]
    MaxRounds { agent: String, rounds: usize },

    /// The model called a function the agent does not declare.
    #[error("agent '{agent}' has no tool named '{tool}'")]
    ToolNotFound { agent: String, tool: String },

    /// The duplex connection was used after close.
    #[error("connection is closed")]
    ConnectionClosed,
}
