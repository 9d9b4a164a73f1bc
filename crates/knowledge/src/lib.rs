//! Knowledge base management for sift.
//!
//! Documents are chunked, embedded and stored in a vector index (in-memory
//! flat or SQLite); queries are answered by a [`Retriever`] with optional
//! reranking.

pub mod chunker;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod flat_index;
pub mod rerank;
pub mod retriever;
pub mod sqlite_index;
pub mod types;
pub mod vector_index;


pub use chunker::Chunker;
pub use config::{IndexBackend, KnowledgeBaseConfig};
pub use embeddings::{Embedder, EmbeddingConfig, EmbeddingProvider};
pub use flat_index::FlatIndex;
pub use rerank::{RelevanceScorer, RerankConfig, Reranker};
pub use retriever::{ChunkSnapshot, Retriever};
pub use sqlite_index::SqliteIndex;
pub use types::{
    CancelFlag, Chunk, Document, DocumentPage, EmbeddedChunk, IndexStats, RerankedCandidate,
    Retrieved, RetrievedCandidate,
};
pub use vector_index::{open_index, VectorIndex};

use sift_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Options for [`index_paths`].
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub base_name: String,
    pub paths: Vec<PathBuf>,
    /// Drop existing contents first
    pub reset: bool,
}

/// Summary of a knowledge base.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BaseStats {
    pub base_name: String,
    pub backend: IndexBackend,
    pub chunks: usize,
    pub dimensions: usize,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub rerank_enabled: bool,
}

/// Load, chunk, embed and index documents into a base.
///
/// Writes the base config on first use so later runs reuse the same
/// embedding settings.
pub async fn index_paths(
    workspace: &Path,
    options: IndexOptions,
    cancel: &CancelFlag,
) -> AppResult<IndexStats> {
    let start = Instant::now();
    tracing::info!("Indexing into knowledge base '{}'", options.base_name);

    let config = config::load_config(workspace, &options.base_name)?;
    let chunker = Chunker::from_config(&config.chunking)?;
    let retriever = Retriever::from_config(
        &config::get_base_dir(workspace, &options.base_name),
        &config,
    )?;

    if options.reset {
        tracing::info!("Resetting knowledge base '{}'", options.base_name);
        retriever.reset().await?;
    }

    let paths = options.paths.clone();
    let (documents, chunks) = tokio::task::spawn_blocking(move || -> AppResult<_> {
        let documents = document::collect_documents(&paths)?;
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| chunker.chunk_document(doc))
            .collect();
        Ok((documents.len(), chunks))
    })
    .await
    .map_err(|e| AppError::Knowledge(format!("Chunking task failed: {}", e)))??;

    let chunk_count = retriever.index_chunks(chunks, cancel).await?;
    config::save_config(workspace, &config)?;

    let stats = IndexStats {
        documents,
        chunks: chunk_count,
        indexed_total: retriever.len().await?,
        duration_secs: start.elapsed().as_secs_f64(),
    };

    tracing::info!(
        "Indexed {} documents ({} chunks, {} total) in {:.2}s",
        stats.documents,
        stats.chunks,
        stats.indexed_total,
        stats.duration_secs
    );

    Ok(stats)
}

/// Statistics for an existing base.
pub async fn stats(workspace: &Path, base_name: &str) -> AppResult<BaseStats> {
    if !config::get_config_path(workspace, base_name).exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let config = config::load_config(workspace, base_name)?;
    let retriever = Retriever::from_config(&config::get_base_dir(workspace, base_name), &config)?;

    Ok(BaseStats {
        base_name: base_name.to_string(),
        backend: config.index.backend,
        chunks: retriever.len().await?,
        dimensions: config.embedding.dimensions,
        embedding_provider: config.embedding.provider.clone(),
        embedding_model: config.embedding.model.clone(),
        rerank_enabled: config.rerank.enabled,
    })
}

/// Remove a base's index, keeping its config.
pub async fn clean(workspace: &Path, base_name: &str) -> AppResult<()> {
    let retriever = Retriever::open(workspace, base_name)?;
    retriever.reset().await?;
    tracing::info!("Knowledge base '{}' cleaned", base_name);
    Ok(())
}
