//! The provider adapter contract.

use crate::{Connection, ResponseStream};
use acore::Request;
use anyhow::Result;

/// A language-model backend adapter.
///
/// Object safe: adapters are produced by registry factories and shared as
/// `Arc<dyn Llm>`.
pub trait Llm: Send + Sync {
    /// The model identifier this adapter serves.
    fn model(&self) -> &str;

    /// Issue one backend request.
    ///
    /// With `stream` set, the returned sequence is zero or more partial
    /// responses followed by one final response. Without it, the sequence
    /// holds exactly one final response. Every call issues a fresh request;
    /// the returned stream cannot be restarted.
    fn generate(&self, request: Request, stream: bool) -> ResponseStream;

    /// Open a duplex connection seeded with the request's history.
    fn connect(&self, request: Request) -> Result<Box<dyn Connection>>;
}
