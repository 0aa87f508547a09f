//! Provider requests.

use crate::Message;
use schemars::Schema;
use serde::{Deserialize, Serialize};

/// A request to a provider adapter: the outbound messages plus sampling
/// and function configuration. Built per call and not retained.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Request {
    /// The conversation to send.
    pub messages: Vec<Message>,

    /// Sampling parameters and function declarations.
    #[serde(default)]
    pub config: RequestConfig,
}

impl Request {
    /// Create a request with default configuration.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: RequestConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }
}

/// Request configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RequestConfig {
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum number of tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Frequency penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Functions the model may call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDeclaration>,
}

impl RequestConfig {
    /// Fill every unset sampling parameter from `fallback`.
    ///
    /// Functions are never inherited.
    pub fn or(self, fallback: &RequestConfig) -> Self {
        Self {
            temperature: self.temperature.or(fallback.temperature),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
            top_p: self.top_p.or(fallback.top_p),
            frequency_penalty: self.frequency_penalty.or(fallback.frequency_penalty),
            presence_penalty: self.presence_penalty.or(fallback.presence_penalty),
            functions: self.functions,
        }
    }

    /// Set the declared functions.
    pub fn with_functions(mut self, functions: Vec<FunctionDeclaration>) -> Self {
        self.functions = functions;
        self
    }
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FunctionDeclaration {
    /// The name of the function
    pub name: String,

    /// What the function does; the model uses it to pick a function.
    pub description: String,

    /// JSON schema of the arguments object.
    pub parameters: Schema,
}

impl FunctionDeclaration {
    /// Create a new declaration.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Schema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
