//! Common imports for building and running agent trees.

pub use crate::{
    Agent, Behavior, Event, FnTool, GoogleSearch, LlmAgent, Loop, Output, Parallel, Sequential,
    Stop,
};
pub use acore::{EngineConfig, InvocationContext, Message, RunConfig, StreamingMode, Tool};
pub use llm::{Llm, Registry};
