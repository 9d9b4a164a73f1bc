//! Query-time retrieval: embed, search, optionally rerank.

use crate::config::{get_base_dir, load_config, KnowledgeBaseConfig};
use crate::embeddings::Embedder;
use crate::rerank::Reranker;
use crate::types::{CancelFlag, Chunk, EmbeddedChunk, Retrieved, RetrievedCandidate};
use crate::vector_index::{open_index, VectorIndex};
use sift_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Immutable view of every indexed chunk, shared cheaply between tasks.
pub type ChunkSnapshot = Arc<[EmbeddedChunk]>;

/// Couples an [`Embedder`], a [`VectorIndex`] and an optional [`Reranker`].
#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    reranker: Option<Reranker>,
    candidate_multiplier: usize,
}

/// Run blocking index work off the async runtime.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Knowledge(format!("Index task failed: {}", e)))?
}

impl Retriever {
    pub fn new(embedder: Embedder, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            reranker: None,
            candidate_multiplier: 1,
        }
    }

    /// Rerank results, fetching `top_k * candidate_multiplier` candidates first.
    pub fn with_reranker(mut self, reranker: Reranker, candidate_multiplier: usize) -> Self {
        self.reranker = Some(reranker);
        self.candidate_multiplier = candidate_multiplier.max(1);
        self
    }

    /// Build a retriever for a base from its configuration.
    pub fn from_config(base_dir: &Path, config: &KnowledgeBaseConfig) -> AppResult<Self> {
        let embedder = Embedder::from_config(&config.embedding)?;
        if embedder.dimensions() != config.embedding.dimensions {
            return Err(AppError::DimensionMismatch {
                expected: config.embedding.dimensions,
                actual: embedder.dimensions(),
            });
        }

        let index = open_index(base_dir, config)?;
        let retriever = Self::new(embedder, index);

        if config.rerank.enabled {
            let reranker = Reranker::from_config(&config.rerank, &retriever.embedder)?;
            Ok(retriever.with_reranker(reranker, config.rerank.candidate_multiplier))
        } else {
            Ok(retriever)
        }
    }

    /// Open the named base in a workspace.
    pub fn open(workspace: &Path, base_name: &str) -> AppResult<Self> {
        let config = load_config(workspace, base_name)?;
        Self::from_config(&get_base_dir(workspace, base_name), &config)
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn reranker(&self) -> Option<&Reranker> {
        self.reranker.as_ref()
    }

    /// Embed chunks, append them to the index as one batch, then persist.
    ///
    /// Overlapping calls are safe: each backend serializes its appends.
    #[instrument(skip(self, chunks, cancel), fields(count = chunks.len()))]
    pub async fn index_chunks(&self, chunks: Vec<Chunk>, cancel: &CancelFlag) -> AppResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_documents_cancellable(&texts, cancel)
            .await?;

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector))
            .collect();
        let added = embedded.len();

        let index = Arc::clone(&self.index);
        blocking(move || {
            index.append(embedded)?;
            index.persist()
        })
        .await?;

        tracing::info!("Indexed {} chunks", added);
        Ok(added)
    }

    /// Top-k chunks for a query, reranked when a reranker is configured.
    #[instrument(skip(self), fields(reranked = self.reranker.is_some()))]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<Retrieved>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_query(query).await?;
        let fetch_k = match self.reranker {
            Some(_) => top_k.saturating_mul(self.candidate_multiplier),
            None => top_k,
        };
        let candidates = self.search(vector, fetch_k).await?;

        match &self.reranker {
            Some(reranker) => {
                let mut reranked = reranker.rerank(query, candidates).await?;
                reranked.truncate(top_k);
                Ok(reranked.into_iter().map(Retrieved::Reranked).collect())
            }
            None => Ok(candidates.into_iter().map(Retrieved::Plain).collect()),
        }
    }

    /// Chunks similar to a piece of indexed text.
    pub async fn retrieve_similar(&self, text: &str, top_k: usize) -> AppResult<Vec<Retrieved>> {
        self.retrieve(text, top_k).await
    }

    async fn search(&self, vector: Vec<f32>, top_k: usize) -> AppResult<Vec<RetrievedCandidate>> {
        let index = Arc::clone(&self.index);
        blocking(move || index.search(&vector, top_k)).await
    }

    /// Snapshot of every indexed chunk in id order.
    pub async fn snapshot(&self) -> AppResult<ChunkSnapshot> {
        let index = Arc::clone(&self.index);
        let chunks = blocking(move || index.chunks()).await?;
        Ok(chunks.into())
    }

    pub async fn len(&self) -> AppResult<usize> {
        let index = Arc::clone(&self.index);
        blocking(move || index.len()).await
    }

    pub async fn reset(&self) -> AppResult<()> {
        let index = Arc::clone(&self.index);
        blocking(move || index.reset()).await
    }
}
