//! Closure-backed tools.

use acore::{BoxFuture, FunctionDeclaration, Tool, ToolContext};
use anyhow::{Context, Result};
use schemars::{JsonSchema, Schema};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{fmt, future::Future, sync::Arc};

/// A type-erased async tool handler.
pub type Handler =
    Arc<dyn Fn(Value, ToolContext) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A tool whose behavior is a closure.
#[derive(Clone)]
pub struct FnTool {
    declaration: FunctionDeclaration,
    handler: Handler,
}

impl FnTool {
    /// Create a tool taking raw JSON arguments.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Schema,
        handler: F,
    ) -> Self
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            declaration: FunctionDeclaration::new(name, description, parameters),
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    /// Create a tool whose arguments deserialize into `A`, with the
    /// parameter schema derived from `A`.
    pub fn typed<A, F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        A: JsonSchema + DeserializeOwned + Send + 'static,
        F: Fn(A, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let name = name.into();
        let tool = name.clone();
        let handler = Arc::new(handler);
        Self::new(name, description, schemars::schema_for!(A), move |args, ctx| {
            let handler = handler.clone();
            let parsed = serde_json::from_value::<A>(args)
                .with_context(|| format!("invalid arguments for tool '{tool}'"));
            async move { handler(parsed?, ctx).await }
        })
    }
}

impl Tool for FnTool {
    fn declaration(&self) -> FunctionDeclaration {
        self.declaration.clone()
    }

    fn invoke(&self, args: Value, ctx: ToolContext) -> BoxFuture<'_, Result<Value>> {
        (self.handler)(args, ctx)
    }

    fn name(&self) -> String {
        self.declaration.name.clone()
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.declaration.name)
            .finish()
    }
}
