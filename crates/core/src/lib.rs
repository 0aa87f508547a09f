//! Core abstractions for the arbor agent engine.
//!
//! This crate holds the value types shared by every other crate:
//! [`Message`], [`Response`], [`Request`], the [`Tool`] contract, the
//! per-invocation [`InvocationContext`] / [`ToolContext`] carriers, and the
//! collaborator contracts for credentials ([`auth`]) and session
//! [`Memory`].

pub use {
    config::{AudioTranscription, EngineConfig, RunConfig, SpeechConfig, StreamingMode},
    context::{InvocationContext, ToolContext},
    error::Error,
    memory::{InMemory, Memory},
    message::{Content, FunctionCall, ImageUrl, Message, Part, Role, ToolCall},
    request::{FunctionDeclaration, Request, RequestConfig},
    response::Response,
    tool::{BoxFuture, Tool},
};

pub mod auth;
mod config;
mod context;
mod error;
mod memory;
mod message;
mod request;
mod response;
mod tool;

/// Name reserved for end-user input; no agent may carry it.
pub const USER: &str = "user";
