//! Model access for sift.
//!
//! Strategies only need "prompt in, text out". [`LlmClient`] offers that as a
//! single completion or a chunk stream, and [`create_client`] picks the
//! backend from config: `ollama` (local runtime, the default) or `static`
//! (canned replies for offline runs and tests).
//!
//! # Example
//! ```no_run
//! use sift_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new()?;
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

pub use client::{
    collect_stream, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage,
};
pub use factory::create_client;
pub use providers::{OllamaClient, StaticClient};
