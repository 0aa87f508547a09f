//! Delegation: children exposed to a model as callable functions.
//!
//! A model-backed agent declares each of its children as a function with
//! a standard `{ input: string }` schema and the child's description. A
//! call to that function runs the child on the input.

use crate::Agent;
use acore::FunctionDeclaration;
use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::Deserialize;

/// Name of the function that ends an enclosing loop.
pub const EXIT_LOOP: &str = "exit_loop";

/// Declare `agent` as a function its parent's model may call.
pub fn declaration(agent: &Agent) -> FunctionDeclaration {
    FunctionDeclaration::new(
        agent.name(),
        agent.description(),
        schemars::schema_for!(DelegateInput),
    )
}

/// Declaration of the built-in loop exit function.
pub fn exit_loop() -> FunctionDeclaration {
    FunctionDeclaration::new(
        EXIT_LOOP,
        "Exits the loop. Call this function only when you are instructed to do so.",
        schemars::json_schema!({
            "type": "object",
            "properties": {}
        }),
    )
}

/// Extract the `input` field from call arguments JSON.
pub fn extract_input(arguments: &str) -> Result<String> {
    let parsed: DelegateInput =
        serde_json::from_str(arguments).context("invalid delegation arguments")?;
    Ok(parsed.input)
}

/// Arguments of a call to a child agent.
#[derive(JsonSchema, Deserialize)]
struct DelegateInput {
    /// The task or question to delegate to this agent.
    input: String,
}
