//! Conversation messages.

use serde::{Deserialize, Serialize};

/// A message in the conversation.
///
/// A conversation is an ordered `Vec<Message>`; order is call order and is
/// preserved end to end.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,

    /// Plain text or typed parts.
    pub content: Content,

    /// Function name for `function` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Legacy single function call made by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    /// The tool call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls made by the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    fn new(role: Role, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            function_call: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message answering `call`.
    pub fn tool(content: impl Into<Content>, call: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    /// Create a legacy function result message.
    pub fn function(name: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(Role::Function, content)
        }
    }

    /// Set the legacy function call.
    pub fn with_function_call(mut self, call: FunctionCall) -> Self {
        self.function_call = Some(call);
        self
    }

    /// Set the tool calls.
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// The text of the message, with text parts joined and images dropped.
    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user input.
    #[default]
    User,
    /// Model output.
    Assistant,
    /// System framing.
    System,
    /// Legacy function result.
    Function,
    /// Tool result.
    Tool,
    /// Model output, for backends that call it `model`.
    Model,
}

impl Role {
    /// The wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Function => "function",
            Role::Tool => "tool",
            Role::Model => "model",
        }
    }
}

/// Message content: plain text or an ordered sequence of typed parts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text.
    Text(String),
    /// Typed parts, in order.
    Parts(Vec<Part>),
}

impl Content {
    /// Flatten to text.
    pub fn text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    Part::Text { text } => Some(text.as_str()),
                    Part::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_owned())
    }
}

impl From<&String> for Content {
    fn from(text: &String) -> Self {
        Content::Text(text.clone())
    }
}

impl From<Vec<Part>> for Content {
    fn from(parts: Vec<Part>) -> Self {
        Content::Parts(parts)
    }
}

/// A typed content part.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    /// A text fragment.
    Text { text: String },
    /// An image reference.
    Image { image_url: ImageUrl },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Create an image part referencing `url`.
    pub fn image(url: impl Into<String>) -> Self {
        Part::Image {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// An image location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImageUrl {
    /// The image URL (or data URL).
    pub url: String,
}

/// A function call made by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FunctionCall {
    /// The name of the function to call
    #[serde(default)]
    pub name: String,

    /// The arguments to pass to the function (JSON string)
    #[serde(default)]
    pub arguments: String,
}

impl FunctionCall {
    /// Create a new function call.
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Append a streamed fragment: name and arguments are concatenated,
    /// never replaced.
    pub fn extend(&mut self, fragment: &FunctionCall) {
        self.name.push_str(&fragment.name);
        self.arguments.push_str(&fragment.arguments);
    }
}

/// A tool call made by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolCall {
    /// The ID of the tool call
    #[serde(default)]
    pub id: String,

    /// The type of tool (currently only "function")
    #[serde(default = "function_type", rename = "type")]
    pub call_type: String,

    /// The function to call
    pub function: FunctionCall,
}

impl ToolCall {
    /// Create a new function tool call.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall::new(name, arguments),
        }
    }

    /// Append a streamed fragment for the same id, leaving id and type
    /// unchanged.
    pub fn extend(&mut self, fragment: &ToolCall) {
        self.function.extend(&fragment.function);
    }
}

fn function_type() -> String {
    "function".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parts_serialize_with_type_tags() {
        let message = Message::user(vec![Part::text("look"), Part::image("https://x/y.png")]);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "look"},
                    {"type": "image", "image_url": {"url": "https://x/y.png"}}
                ]
            })
        );
    }

    #[test]
    fn text_flattens_parts() {
        let content = Content::Parts(vec![
            Part::text("a"),
            Part::image("https://x"),
            Part::text("b"),
        ]);
        assert_eq!(content.text(), "a\nb");
    }

    #[test]
    fn tool_message_carries_call_id() {
        let message = Message::tool("42", "call_1");
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["tool_call_id"], "call_1");
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn extend_concatenates_fragments() {
        let mut call = ToolCall::new("a", "fo", "{\"x\":");
        call.extend(&ToolCall::new("", "o", "1}"));
        assert_eq!(call.id, "a");
        assert_eq!(call.function.name, "foo");
        assert_eq!(call.function.arguments, "{\"x\":1}");
    }

    #[test]
    fn model_role_round_trips() {
        let role: Role = serde_json::from_value(json!("model")).unwrap();
        assert_eq!(role, Role::Model);
        assert_eq!(role.as_str(), "model");
    }
}
