//! Run and engine configuration.

use crate::RequestConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a model-backed agent talks to its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingMode {
    /// One single-shot call per model turn.
    #[default]
    None,
    /// Server-sent-events style streaming with call reconstruction.
    Sse,
    /// Bidirectional connection.
    Bidi,
}

/// Speech configuration for live agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpeechConfig {
    /// Voice to use for speech.
    pub voice: Option<String>,
    /// Language code.
    pub language: Option<String>,
}

/// Audio transcription configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AudioTranscription {
    /// Whether transcription is on.
    pub enabled: bool,
    /// Language code for transcription.
    pub language: Option<String>,
}

/// Runtime behavior of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Streaming mode.
    pub streaming_mode: StreamingMode,

    /// Speech configuration for live agents.
    pub speech: Option<SpeechConfig>,

    /// The output modalities.
    pub response_modalities: Option<Vec<String>>,

    /// Whether to save input blobs as artifacts.
    pub save_input_blobs_as_artifacts: bool,

    /// Compositional function calling, only meaningful with SSE streaming.
    pub support_cfc: bool,

    /// Output audio transcription.
    pub output_audio_transcription: Option<AudioTranscription>,
}

impl RunConfig {
    /// A config with the given streaming mode.
    pub fn streaming(mode: StreamingMode) -> Self {
        Self {
            streaming_mode: mode,
            ..Default::default()
        }
    }
}

/// Engine-wide defaults, loaded from TOML.
///
/// ```toml
/// default_model = "gpt-4-turbo"
/// max_rounds = 8
/// stream_buffer = 32
///
/// [request]
/// temperature = 0.2
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model used by agents that do not name one.
    pub default_model: Option<String>,

    /// Default sampling parameters.
    pub request: RequestConfig,

    /// Cap on tool rounds per model-backed turn; unbounded when unset.
    pub max_rounds: Option<usize>,

    /// Capacity of the bounded channels behind response streams.
    pub stream_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_model: None,
            request: RequestConfig::default(),
            max_rounds: None,
            stream_buffer: 32,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).context("invalid engine config")?;
        if config.stream_buffer == 0 {
            anyhow::bail!("stream_buffer must be at least 1");
        }
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content)
    }
}
