//! Provider adapter contract for the arbor agent engine.
//!
//! An adapter turns a [`Request`](acore::Request) into a
//! [`ResponseStream`], or opens a duplex [`Connection`]. Streaming adapters
//! feed raw chunks through [`reconstruct`] so every partial carries the
//! cumulative function and tool call state. The [`Registry`] maps model
//! identifiers to adapter factories by regular expression.

pub use {
    accumulator::{Accumulator, reconstruct},
    connection::{Callbacks, Connection, OnEnd, OnError, OnResponse, Signal, subscribe},
    provider::Llm,
    registry::{Factory, Registry},
    stream::{DEFAULT_BUFFER, ResponseStream, TaskStream},
};

mod accumulator;
mod connection;
mod provider;
mod registry;
mod stream;
#[cfg(feature = "testing")]
pub mod testing;
