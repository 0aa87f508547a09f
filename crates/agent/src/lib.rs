//! Arbor agent trees.
//!
//! - [`Agent`]: a named node owning its children, created through
//!   [`Agent::builder`] and grown with [`Agent::attach`].
//! - [`Behavior`]: what a node does when run. [`LlmAgent`] talks to a
//!   model; [`Sequential`], [`Parallel`] and [`Loop`] schedule children.
//! - [`FnTool`] / [`GoogleSearch`]: tools a model-backed agent can call.
//!
//! Every agent can be run to an [`Output`] with [`Agent::run`] or streamed
//! as [`Event`]s with [`Agent::run_streaming`].

pub use {
    agent::{Agent, AgentBuilder, validate_name},
    behavior::{Behavior, Event, Events, Output, Stop},
    delegate::{EXIT_LOOP, extract_input},
    llm_agent::LlmAgent,
    loops::{Loop, Predicate},
    parallel::Parallel,
    search::{GoogleSearch, SearchArgs, SearchResult},
    sequential::Sequential,
    tool::{FnTool, Handler},
};

mod agent;
mod behavior;
pub mod delegate;
mod llm_agent;
mod loops;
mod parallel;
pub mod prelude;
mod search;
mod sequential;
mod tool;
