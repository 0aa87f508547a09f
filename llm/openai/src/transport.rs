//! HTTP transport for chat completions.

use crate::ChatRequest;
use acore::{BoxFuture, auth::AuthHandler};
use anyhow::Result;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{
    Client, Method,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;
use std::pin::Pin;

/// Raw JSON chunks of a streamed completion.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// Moves chat completion bodies to a backend and raw JSON back.
pub trait Transport: Send + Sync {
    /// Send a non-streaming request and return the response body.
    fn complete(&self, body: ChatRequest) -> BoxFuture<'static, Result<Value>>;

    /// Send a streaming request and yield each SSE `data` payload.
    fn stream(&self, body: ChatRequest) -> ChunkStream;
}

/// Transport over `reqwest` for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    headers: HeaderMap,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport with Bearer token authentication.
    pub fn bearer(client: Client, key: &str, endpoint: &str) -> Result<Self> {
        let mut transport = Self::no_auth(client, endpoint);
        transport
            .headers
            .insert(header::AUTHORIZATION, format!("Bearer {key}").parse()?);
        Ok(transport)
    }

    /// Create a transport without authentication (e.g. a local server).
    pub fn no_auth(client: Client, endpoint: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
        }
    }

    /// Create a transport that sends the handler's credential headers.
    pub fn with_auth(client: Client, auth: &AuthHandler, endpoint: &str) -> Result<Self> {
        let mut transport = Self::no_auth(client, endpoint);
        for (name, value) in auth.headers() {
            transport
                .headers
                .insert(name.parse::<HeaderName>()?, value.parse::<HeaderValue>()?);
        }
        Ok(transport)
    }

    /// Get the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl Transport for HttpTransport {
    fn complete(&self, body: ChatRequest) -> BoxFuture<'static, Result<Value>> {
        if let Ok(body) = serde_json::to_string(&body) {
            tracing::trace!("request: {body}");
        }
        let request = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(&body);

        Box::pin(async move {
            let text = request.send().await?.error_for_status()?.text().await?;
            serde_json::from_str(&text).map_err(Into::into)
        })
    }

    fn stream(&self, body: ChatRequest) -> ChunkStream {
        if let Ok(body) = serde_json::to_string(&body) {
            tracing::trace!("request: {body}");
        }
        let request = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(&body);

        Box::pin(try_stream! {
            let response = request.send().await?.error_for_status()?;
            let mut bytes = response.bytes_stream();
            let mut lines = SseLines::default();
            while let Some(next) = bytes.next().await {
                let next = next?;
                tracing::trace!("chunk: {}", String::from_utf8_lossy(&next));
                for data in lines.push(&next) {
                    match serde_json::from_str::<Value>(&data) {
                        Ok(chunk) => yield chunk,
                        Err(e) => tracing::warn!("failed to parse chunk: {e}, data: {data}"),
                    }
                }
            }
        })
    }
}

/// Splits an SSE byte stream into `data` payloads.
///
/// Network chunks may end mid-line, so incomplete lines are held until
/// the next push. The `[DONE]` sentinel and blank payloads are dropped.
#[derive(Debug, Default)]
pub struct SseLines {
    pending: String,
}

impl SseLines {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));
        let Some(end) = self.pending.rfind('\n') else {
            return Vec::new();
        };

        let complete: String = self.pending.drain(..=end).collect();
        complete
            .lines()
            .filter_map(|line| line.trim().strip_prefix("data:"))
            .map(str::trim)
            .filter(|data| !data.is_empty() && !data.starts_with("[DONE]"))
            .map(str::to_owned)
            .collect()
    }
}
