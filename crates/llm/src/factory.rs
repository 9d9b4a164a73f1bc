//! LLM provider factory.
//!
//! Resolves a provider name plus its optional config-file entry into a ready
//! client.

use crate::client::LlmClient;
use crate::providers::{ollama::DEFAULT_OLLAMA_URL, OllamaClient, StaticClient};
use sift_core::config::ProviderConfig;
use sift_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client for `provider`.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "static")
/// * `config` - Provider entry from config.yaml, if any
///
/// # Errors
/// Returns `AppError::Config` for unknown providers or a config entry that
/// belongs to a different provider.
pub fn create_client(
    provider: &str,
    config: Option<&ProviderConfig>,
) -> AppResult<Arc<dyn LlmClient>> {
    match (provider.to_lowercase().as_str(), config) {
        ("ollama", None) => Ok(Arc::new(OllamaClient::with_options(DEFAULT_OLLAMA_URL, None)?)),
        ("ollama", Some(ProviderConfig::Ollama { endpoint, timeout, .. })) => {
            Ok(Arc::new(OllamaClient::with_options(endpoint.as_str(), *timeout)?))
        }
        ("static", None) => Ok(Arc::new(StaticClient::new(""))),
        ("static", Some(ProviderConfig::Static { reply })) => {
            Ok(Arc::new(StaticClient::new(reply.as_str())))
        }
        ("ollama", Some(_)) | ("static", Some(_)) => Err(AppError::Config(format!(
            "Configuration entry for provider '{}' has the wrong shape",
            provider
        ))),
        _ => Err(AppError::Config(format!(
            "Unknown provider: {}. Supported: ollama, static",
            provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let config = ProviderConfig::Ollama {
            endpoint: "http://localhost:8080".to_string(),
            model: "llama3.2".to_string(),
            embedding_model: None,
            timeout: Some(10),
            temperature: None,
            stream: false,
        };
        assert!(create_client("ollama", Some(&config)).is_ok());
    }

    #[test]
    fn test_create_static_client() {
        let config = ProviderConfig::Static {
            reply: "RESPONSE: ok".to_string(),
        };
        let client = create_client("static", Some(&config)).unwrap();
        assert_eq!(client.provider_name(), "static");
    }

    #[test]
    fn test_mismatched_config_rejected() {
        let config = ProviderConfig::Static {
            reply: "x".to_string(),
        };
        assert!(create_client("ollama", Some(&config)).is_err());
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
