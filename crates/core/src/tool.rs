//! The tool contract.

use crate::{FunctionDeclaration, ToolContext};
use anyhow::Result;
use serde_json::Value;
use std::{future::Future, pin::Pin};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A tool the model can call.
///
/// The engine only needs the declaration to advertise the tool and
/// `invoke` to run it; the result shape is tool-defined.
pub trait Tool: Send + Sync {
    /// The function declaration advertised to the model.
    fn declaration(&self) -> FunctionDeclaration;

    /// Run the tool with parsed JSON arguments.
    fn invoke(&self, args: Value, ctx: ToolContext) -> BoxFuture<'_, Result<Value>>;

    /// The tool name.
    fn name(&self) -> String {
        self.declaration().name
    }
}
