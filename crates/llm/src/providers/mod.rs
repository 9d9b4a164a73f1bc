//! LLM provider implementations.

pub mod ollama;
pub mod static_reply;

pub use ollama::OllamaClient;
pub use static_reply::StaticClient;
