//! OpenAI-compatible provider adapter.
//!
//! Covers OpenAI and any other service exposing the chat completions API.
//! Register it with [`register`] to serve every model in
//! [`SUPPORTED_MODELS`].

pub use {
    connection::OpenAiConnection,
    transport::{ChunkStream, HttpTransport, SseLines, Transport},
    wire::{ChatRequest, ChunkDecoder, WireContent, WireMessage, WirePart, WireTool, completion},
};

use acore::{Request, RequestConfig};
use anyhow::{Context, Result};
use async_stream::try_stream;
use futures_util::StreamExt;
use llm::{Connection, DEFAULT_BUFFER, Llm, Registry, ResponseStream, reconstruct};
use reqwest::Client;
use std::sync::Arc;

mod connection;
mod transport;
mod wire;

/// OpenAI-compatible endpoint URLs.
pub mod endpoint {
    /// OpenAI chat completions.
    pub const OPENAI: &str = "https://api.openai.com/v1/chat/completions";
    /// Ollama local chat completions.
    pub const OLLAMA: &str = "http://localhost:11434/v1/chat/completions";
}

/// Model patterns served by this adapter, in registration order.
pub const SUPPORTED_MODELS: &[&str] = &[
    "gpt-4-.*",
    "gpt-3.5-.*",
    "text-davinci-.*",
    "^gpt-4o.*",
    "^o[134].*",
];

/// Sampling parameters applied when a request leaves them unset.
pub fn defaults() -> RequestConfig {
    RequestConfig {
        temperature: Some(0.7),
        top_p: Some(1.0),
        frequency_penalty: Some(0.0),
        presence_penalty: Some(0.0),
        ..Default::default()
    }
}

/// Register this adapter for [`SUPPORTED_MODELS`], sharing one transport.
pub fn register(registry: &Registry, transport: Arc<dyn Transport>) -> Result<()> {
    registry.register_all(SUPPORTED_MODELS, move |model| {
        Ok(Arc::new(OpenAi::new(model, transport.clone())) as Arc<dyn Llm>)
    })
}

/// An OpenAI-compatible adapter bound to one model.
#[derive(Clone)]
pub struct OpenAi {
    model: String,
    transport: Arc<dyn Transport>,
    defaults: RequestConfig,
    buffer: usize,
}

impl OpenAi {
    pub fn new(model: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            model: model.into(),
            transport,
            defaults: defaults(),
            buffer: DEFAULT_BUFFER,
        }
    }

    /// An adapter targeting the OpenAI API.
    pub fn api(client: Client, key: &str, model: impl Into<String>) -> Result<Self> {
        let transport = HttpTransport::bearer(client, key, endpoint::OPENAI)?;
        Ok(Self::new(model, Arc::new(transport)))
    }

    /// An adapter keyed by `OPENAI_API_KEY`, honoring `OPENAI_BASE_URL`.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        let endpoint = match std::env::var("OPENAI_BASE_URL") {
            Ok(base) => format!("{}/chat/completions", base.trim_end_matches('/')),
            Err(_) => endpoint::OPENAI.to_owned(),
        };
        let transport = HttpTransport::bearer(Client::new(), &key, &endpoint)?;
        Ok(Self::new(model, Arc::new(transport)))
    }

    /// Override the default sampling parameters; unset values keep the
    /// built-in defaults.
    pub fn with_defaults(mut self, config: RequestConfig) -> Self {
        self.defaults = config.or(&defaults());
        self
    }

    /// Set the response channel capacity.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// The effective default sampling parameters.
    pub fn defaults(&self) -> &RequestConfig {
        &self.defaults
    }

    /// Build the wire body for a request.
    pub fn body(&self, request: &Request, stream: bool) -> ChatRequest {
        ChatRequest::new(&self.model, request, &self.defaults, stream)
    }
}

impl Llm for OpenAi {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: Request, stream: bool) -> ResponseStream {
        let body = self.body(&request, stream);
        let transport = self.transport.clone();
        tracing::debug!(
            "generating with {} ({} messages, stream: {stream})",
            self.model,
            body.messages.len()
        );

        if stream {
            let chunks = try_stream! {
                let mut decoder = ChunkDecoder::default();
                let mut raw = transport.stream(body);
                while let Some(next) = raw.next().await {
                    if let Some(response) = decoder.decode(next?) {
                        yield response;
                    }
                }
            };
            return ResponseStream::new(reconstruct(chunks)).with_buffer(self.buffer);
        }

        let model = self.model.clone();
        ResponseStream::new(try_stream! {
            let raw = transport.complete(body).await?;
            yield completion(&model, raw)?;
        })
        .with_buffer(self.buffer)
    }

    fn connect(&self, request: Request) -> Result<Box<dyn Connection>> {
        Ok(Box::new(OpenAiConnection::new(self.clone(), request)))
    }
}
