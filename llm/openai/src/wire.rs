//! Chat completions wire format.
//!
//! Outbound: [`ChatRequest`] built from an engine [`Request`]. Inbound:
//! [`ChatCompletion`] for single-shot calls and [`ChatChunk`] for SSE
//! chunks, decoded into engine [`Response`]s.

use acore::{
    Content, Error, FunctionCall, FunctionDeclaration, ImageUrl, Message, Part, Request,
    RequestConfig, Response, Role, ToolCall,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Chat completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
}

impl ChatRequest {
    /// Build the body; request-level parameters override `defaults`.
    pub fn new(model: &str, request: &Request, defaults: &RequestConfig, stream: bool) -> Self {
        let config = request.config.clone().or(defaults);
        Self {
            model: model.to_owned(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
            stream,
            tools: config.functions.into_iter().map(WireTool::from).collect(),
        }
    }
}

/// A message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: WireContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// Message content on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

/// A typed content part on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let mut wire = WireMessage {
            role: "user",
            content: WireContent::Text(message.text()),
            name: None,
            function_call: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        };

        match message.role {
            Role::System => wire.role = "system",
            Role::Assistant => {
                wire.role = "assistant";
                wire.function_call = message.function_call.clone();
                wire.tool_calls = message.tool_calls.clone();
            }
            Role::Function => {
                wire.role = "function";
                wire.name = Some(message.name.clone().unwrap_or_default());
            }
            Role::Tool => {
                wire.role = "tool";
                wire.tool_call_id = Some(
                    message
                        .tool_call_id
                        .clone()
                        .unwrap_or_else(|| "unknown".to_owned()),
                );
            }
            // The backend has no model role.
            Role::User | Role::Model => {}
        }

        if let (Role::User | Role::System, Content::Parts(parts)) = (message.role, &message.content) {
            let parts: Vec<_> = parts
                .iter()
                .map(|part| match part {
                    Part::Text { text } => WirePart::Text { text: text.clone() },
                    Part::Image { image_url } => WirePart::ImageUrl {
                        image_url: image_url.clone(),
                    },
                })
                .collect();
            if !parts.is_empty() {
                wire.content = WireContent::Parts(parts);
            }
        }

        wire
    }
}

/// A declared function on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDeclaration,
}

impl From<FunctionDeclaration> for WireTool {
    fn from(function: FunctionDeclaration) -> Self {
        Self {
            kind: "function",
            function,
        }
    }
}

/// A single-shot completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ReplyMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    pub function_call: Option<FunctionCall>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Decode a raw completion body into its first choice.
///
/// Fails with [`Error::EmptyResponse`] when there are no choices.
pub fn completion(model: &str, raw: Value) -> Result<Response> {
    let completion: ChatCompletion = serde_json::from_value(raw.clone())?;
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(Error::EmptyResponse {
            model: model.to_owned(),
        }
        .into());
    };

    let message = choice.message;
    Ok(Response {
        content: message.content,
        function_call: message.function_call,
        tool_calls: message.tool_calls.filter(|calls| !calls.is_empty()),
        role: role(message.role.as_deref()),
        partial: false,
        raw: Some(raw),
    })
}

/// One SSE chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
    pub function_call: Option<DeltaFunction>,
    pub tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeltaFunction {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

impl From<DeltaFunction> for FunctionCall {
    fn from(delta: DeltaFunction) -> Self {
        FunctionCall::new(
            delta.name.unwrap_or_default(),
            delta.arguments.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeltaToolCall {
    pub index: Option<usize>,
    pub id: Option<String>,
    pub function: Option<DeltaFunction>,
}

/// Turns SSE chunks into partial responses.
///
/// The backend sends a tool call's id only with its first fragment and
/// identifies later fragments by position; the decoder restores the id so
/// fragments can be merged by id downstream.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    ids: HashMap<usize, String>,
}

impl ChunkDecoder {
    /// Decode one raw chunk. Chunks without choices yield nothing.
    pub fn decode(&mut self, raw: Value) -> Option<Response> {
        let chunk: ChatChunk = match serde_json::from_value(raw.clone()) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("failed to decode chunk: {e}, data: {raw}");
                return None;
            }
        };
        let delta = chunk.choices.into_iter().next()?.delta;

        let tool_calls = delta.tool_calls.map(|fragments| {
            fragments
                .into_iter()
                .enumerate()
                .map(|(position, fragment)| {
                    let index = fragment.index.unwrap_or(position);
                    let id = match fragment.id.filter(|id| !id.is_empty()) {
                        Some(id) => {
                            self.ids.insert(index, id.clone());
                            id
                        }
                        None => self.ids.get(&index).cloned().unwrap_or_default(),
                    };
                    let function = fragment.function.unwrap_or_default();
                    ToolCall::new(
                        id,
                        function.name.unwrap_or_default(),
                        function.arguments.unwrap_or_default(),
                    )
                })
                .collect::<Vec<_>>()
        });

        Some(Response {
            content: delta.content,
            function_call: delta.function_call.map(FunctionCall::from),
            tool_calls: tool_calls.filter(|calls| !calls.is_empty()),
            role: role(delta.role.as_deref()),
            partial: true,
            raw: Some(raw),
        })
    }
}

fn role(role: Option<&str>) -> Role {
    match role {
        Some("user") => Role::User,
        Some("system") => Role::System,
        Some("tool") => Role::Tool,
        Some("function") => Role::Function,
        _ => Role::Assistant,
    }
}
