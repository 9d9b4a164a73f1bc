//! Provider-neutral request, response and streaming types, plus the
//! [`LlmClient`] trait the providers implement.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use sift_core::AppResult;
use std::pin::Pin;

/// One prompt sent to a model. Unset sampling options fall back to the
/// provider's own defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    pub prompt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub stream: bool,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_system(self, system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            ..self
        }
    }

    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..self
        }
    }

    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..self
        }
    }

    /// Mark the request for [`LlmClient::stream`].
    pub fn with_streaming(self) -> Self {
        Self {
            stream: true,
            ..self
        }
    }
}

/// A finished completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: LlmUsage,

    /// False when the provider stopped before signalling completion
    #[serde(default = "finished")]
    pub done: bool,
}

fn finished() -> bool {
    true
}

/// Token counts reported by the provider; zero when it reports none.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Incremental piece of a streamed completion. Only the final chunk
/// carries `done` and, when the provider reports it, `usage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStreamChunk {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
}

pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<LlmStreamChunk>> + Send>>;

/// Drain a stream into a single response.
///
/// The first error aborts collection. A stream that ends without a `done`
/// chunk yields a response with `done == false`.
pub async fn collect_stream(mut stream: LlmStream) -> AppResult<LlmResponse> {
    let mut content = String::new();
    let mut model = String::new();
    let mut usage = LlmUsage::default();
    let mut done = false;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        content.push_str(&chunk.content);
        if model.is_empty() {
            model = chunk.model;
        }
        if let Some(u) = chunk.usage {
            usage = u;
        }
        if chunk.done {
            done = true;
            break;
        }
    }

    Ok(LlmResponse {
        content,
        model,
        usage,
        done,
    })
}

/// A model backend. Callers treat it as an opaque text generator: a prompt
/// goes in and whatever text comes back is parsed by the strategy.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Short provider tag used in logs ("ollama", "static").
    fn provider_name(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream>;
}
