//! Provider responses.

use crate::{Content, FunctionCall, Message, Role, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A response from a provider adapter.
///
/// A generation is zero or more partial responses followed by one final
/// response (`partial == false`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Response {
    /// Text content, if any.
    #[serde(default)]
    pub content: Option<String>,

    /// Legacy single function call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    /// Tool calls, in first-seen order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Role of the author, usually assistant.
    #[serde(default = "assistant")]
    pub role: Role,

    /// Whether this is an in-progress chunk of a stream.
    #[serde(default, rename = "is_partial")]
    pub partial: bool,

    /// The raw provider payload.
    #[serde(default, rename = "raw_response", skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl Response {
    /// A final text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            role: Role::Assistant,
            ..Default::default()
        }
    }

    /// A partial text chunk.
    pub fn chunk(content: impl Into<String>) -> Self {
        Self {
            partial: true,
            ..Self::text(content)
        }
    }

    /// A final response carrying tool calls.
    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            role: Role::Assistant,
            ..Default::default()
        }
    }

    /// A final response carrying a legacy function call.
    pub fn call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            role: Role::Assistant,
            ..Default::default()
        }
    }

    /// Mark the response as partial.
    pub fn into_partial(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Whether the response asks for a function or tool invocation.
    pub fn has_calls(&self) -> bool {
        self.function_call.is_some() || self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Convert into the assistant turn it represents.
    pub fn message(&self) -> Message {
        let role = match self.role {
            Role::Model => Role::Model,
            _ => Role::Assistant,
        };
        Message {
            role,
            content: Content::Text(self.content.clone().unwrap_or_default()),
            name: None,
            function_call: self.function_call.clone(),
            tool_call_id: None,
            tool_calls: self.tool_calls.clone().unwrap_or_default(),
        }
    }
}

fn assistant() -> Role {
    Role::Assistant
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_keeps_calls() {
        let response = Response::calls(vec![ToolCall::new("a", "foo", "{}")]);
        let message = response.message();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.text(), "");
    }

    #[test]
    fn wire_shape_uses_is_partial() {
        let value = serde_json::to_value(Response::chunk("he")).unwrap();
        assert_eq!(value["is_partial"], json!(true));
        assert_eq!(value["role"], json!("assistant"));
        assert_eq!(value["content"], json!("he"));
    }

    #[test]
    fn empty_tool_calls_are_not_calls() {
        assert!(!Response::calls(vec![]).has_calls());
        assert!(Response::call(FunctionCall::new("f", "{}")).has_calls());
    }
}
