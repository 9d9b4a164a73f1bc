//! Embedding engine for knowledge bases.
//!
//! The [`Embedder`] wraps a provider with batching, optional normalization and
//! dimension checks. Output never depends on the batch size.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use crate::types::CancelFlag;
use crate::vector_index::normalize;
use sift_core::{AppError, AppResult};
use std::sync::Arc;

/// Batched embedding front end over an [`EmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    normalize: bool,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, normalize: bool) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            normalize,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> AppResult<Self> {
        let provider = create_provider(config)?;
        Ok(Self::new(provider, config.batch_size, config.normalize))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed texts in order, one vector per text.
    pub async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.embed_documents_cancellable(texts, &CancelFlag::new())
            .await
    }

    /// Like [`embed_documents`](Self::embed_documents), checking `cancel`
    /// before each batch.
    pub async fn embed_documents_cancellable(
        &self,
        texts: &[String],
        cancel: &CancelFlag,
    ) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Embedding {} texts with provider '{}' (model: {}, batch size: {})",
            texts.len(),
            self.provider.provider_name(),
            self.provider.model_name(),
            self.batch_size
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!("Embedding cancelled after {} texts", embeddings.len());
                return Err(AppError::Cancelled(format!(
                    "embedding stopped after {} of {} texts",
                    embeddings.len(),
                    texts.len()
                )));
            }

            let vectors = self
                .provider
                .embed_batch(batch)
                .await
                .map_err(|e| self.annotate_batch_error(e, batch.len()))?;

            if vectors.len() != batch.len() {
                return Err(AppError::EmbeddingBackend(format!(
                    "Provider returned {} embeddings for a batch of {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            for vector in vectors {
                embeddings.push(self.finish(vector)?);
            }

            tracing::debug!("Embedded batch {} ({} texts)", batch_no + 1, batch.len());
        }

        Ok(embeddings)
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let vector = self.provider.embed(text).await?;
        self.finish(vector)
    }

    fn finish(&self, mut vector: Vec<f32>) -> AppResult<Vec<f32>> {
        let expected = self.provider.dimensions();
        if vector.len() != expected {
            return Err(AppError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        if self.normalize {
            normalize(&mut vector);
        }
        Ok(vector)
    }

    fn annotate_batch_error(&self, error: AppError, batch_len: usize) -> AppError {
        match error {
            AppError::EmbeddingBackend(msg) => AppError::EmbeddingBackend(format!(
                "{} (batch of {} texts; retry with batch_size {})",
                msg,
                batch_len,
                (batch_len / 2).max(1)
            )),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::HashingProvider;
    use parking_lot::Mutex;

    fn texts(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("document number {} about topic{}", i, i % 7))
            .collect()
    }

    /// Records batch sizes and fails on demand.
    #[derive(Debug, Default)]
    struct RecordingProvider {
        batches: Mutex<Vec<usize>>,
        fail: bool,
        dims: usize,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn provider_name(&self) -> &str {
            "recording"
        }

        fn model_name(&self) -> &str {
            "recording"
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            self.batches.lock().push(texts.len());
            if self.fail {
                return Err(AppError::EmbeddingBackend("out of memory".to_string()));
            }
            Ok(texts.iter().map(|_| vec![3.0; self.dims]).collect())
        }
    }

    #[tokio::test]
    async fn test_batch_size_invariance() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(128));
        let inputs = texts(23);

        let whole = Embedder::new(provider.clone(), 100, true)
            .embed_documents(&inputs)
            .await
            .unwrap();

        for batch_size in [1, 4, 7, 23] {
            let batched = Embedder::new(provider.clone(), batch_size, true)
                .embed_documents(&inputs)
                .await
                .unwrap();
            assert_eq!(batched, whole, "batch_size={}", batch_size);
        }
    }

    #[tokio::test]
    async fn test_batches_are_bounded() {
        let provider = Arc::new(RecordingProvider {
            dims: 4,
            ..Default::default()
        });
        let embedder = Embedder::new(provider.clone(), 4, false);

        let out = embedder.embed_documents(&texts(10)).await.unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(*provider.batches.lock(), vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn test_normalization() {
        let provider = Arc::new(RecordingProvider {
            dims: 4,
            ..Default::default()
        });

        let raw = Embedder::new(provider.clone(), 8, false)
            .embed_query("x")
            .await
            .unwrap();
        assert_eq!(raw, vec![3.0; 4]);

        let unit = Embedder::new(provider, 8, true)
            .embed_query("x")
            .await
            .unwrap();
        let norm: f32 = unit.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let embedder = Embedder::from_config(&EmbeddingConfig::default()).unwrap();
        assert!(embedder.embed_documents(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_error_suggests_smaller_batch() {
        let provider = Arc::new(RecordingProvider {
            dims: 4,
            fail: true,
            ..Default::default()
        });
        let err = Embedder::new(provider, 16, true)
            .embed_documents(&texts(20))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("retry with batch_size 8"));
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let provider = Arc::new(RecordingProvider {
            dims: 3,
            ..Default::default()
        });
        let err = Embedder::new(provider, 16, true)
            .embed_documents(&texts(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_between_batches() {
        let embedder = Embedder::from_config(&EmbeddingConfig::default()).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = embedder
            .embed_documents_cancellable(&texts(5), &cancel)
            .await;
        assert!(matches!(result, Err(AppError::Cancelled(_))));
    }
}
