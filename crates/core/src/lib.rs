//! Shared plumbing for the sift crates: the [`AppError`] type every crate
//! returns, tracing setup, and the layered [`AppConfig`] with its RAG
//! settings block.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, RagSettings};
pub use error::{AppError, AppResult};
