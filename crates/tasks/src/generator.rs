//! Text generation through an [`LlmClient`].

use sift_core::config::ProviderConfig;
use sift_core::{AppConfig, AppResult};
use sift_llm::{collect_stream, create_client, LlmClient, LlmRequest};
use std::fmt;
use std::sync::Arc;

/// An LLM client bound to a model and sampling options.
#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    stream: bool,
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("stream", &self.stream)
            .finish()
    }
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    /// Build from the active provider in `config`.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let provider_config = config.get_provider_config(&config.provider);
        let client = create_client(&config.provider, provider_config.as_ref())?;
        let mut generator = Self::new(client, config.model.clone());

        if let Some(ProviderConfig::Ollama {
            temperature,
            stream,
            ..
        }) = provider_config
        {
            generator.temperature = temperature;
            generator.stream = stream;
        }

        Ok(generator)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Collect the reply from a token stream instead of a single completion.
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a reply for `prompt`.
    pub async fn generate(&self, prompt: &str) -> AppResult<String> {
        let mut request = LlmRequest::new(prompt, self.model.clone());
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let started = std::time::Instant::now();
        let content = if self.stream {
            let stream = self.client.stream(&request.with_streaming()).await?;
            collect_stream(stream).await?.content
        } else {
            self.client.complete(&request).await?.content
        };

        tracing::debug!(
            provider = self.client.provider_name(),
            model = %self.model,
            chars = content.len(),
            "Generated reply in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_llm::StaticClient;

    #[tokio::test]
    async fn test_generate_complete_and_stream_agree() {
        let client = Arc::new(StaticClient::new("RESPONSE: cats are mammals"));

        let plain = Generator::new(client.clone(), "static");
        let streaming = Generator::new(client.clone(), "static").with_streaming(true);

        assert_eq!(
            plain.generate("q").await.unwrap(),
            streaming.generate("q").await.unwrap()
        );
        assert_eq!(client.prompts(), vec!["q".to_string(), "q".to_string()]);
    }

    #[tokio::test]
    async fn test_generate_propagates_failure() {
        let generator = Generator::new(Arc::new(StaticClient::failing("offline")), "static");
        assert!(generator.generate("q").await.unwrap_err().is_retryable());
    }

    #[test]
    fn test_from_config_static_provider() {
        let config = AppConfig {
            provider: "static".to_string(),
            ..AppConfig::default()
        };
        let generator = Generator::from_config(&config).unwrap();
        assert_eq!(generator.model(), "llama3.2");
    }
}
