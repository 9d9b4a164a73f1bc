//! Vector index abstraction for embedded chunks.
//!
//! Two backends implement [`VectorIndex`]: [`FlatIndex`] keeps everything in
//! memory and can be saved to a directory, [`SqliteIndex`] persists rows and
//! ranks them in SQL. Similarity is always the inner product; with
//! normalization on, that is cosine similarity.

use crate::config::{get_flat_index_dir, get_sqlite_path, IndexBackend, KnowledgeBaseConfig};
use crate::flat_index::FlatIndex;
use crate::sqlite_index::SqliteIndex;
use crate::types::{EmbeddedChunk, RetrievedCandidate};
use sift_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// Trait for vector index backends.
///
/// All methods are blocking. Async callers should go through
/// `tokio::task::spawn_blocking`.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    /// Which backend this is.
    fn backend(&self) -> IndexBackend;

    /// Dimension every stored and query vector must have.
    fn dimensions(&self) -> usize;

    /// Add chunks to the index.
    ///
    /// The flat backend replaces its contents; the SQLite backend appends in
    /// a single transaction.
    fn build(&self, chunks: Vec<EmbeddedChunk>) -> AppResult<()>;

    /// Add chunks after the existing contents as one batch.
    ///
    /// Either every chunk is stored or none is. Concurrent appends are
    /// serialized by the backend, so no batch is lost.
    fn append(&self, chunks: Vec<EmbeddedChunk>) -> AppResult<()>;

    /// Top-k chunks by descending similarity, ties broken by ascending id.
    ///
    /// Returns `min(top_k, len)` results; an empty index yields an empty list.
    fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<RetrievedCandidate>>;

    /// Number of stored chunks.
    fn len(&self) -> AppResult<usize>;

    fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Every stored chunk in id order.
    fn chunks(&self) -> AppResult<Vec<EmbeddedChunk>>;

    /// Drop all contents and recreate the backing store.
    fn reset(&self) -> AppResult<()>;

    /// Flush contents to durable storage, for backends that buffer.
    fn persist(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Open the index configured for a knowledge base.
///
/// A flat index is loaded from `base_dir/flat` when saved there before; a
/// SQLite index is opened at `base_dir/index.sqlite`, creating the schema.
pub fn open_index(base_dir: &Path, config: &KnowledgeBaseConfig) -> AppResult<Arc<dyn VectorIndex>> {
    let dimensions = config.embedding.dimensions;
    let normalize = config.embedding.normalize;

    let index: Arc<dyn VectorIndex> = match config.index.backend {
        IndexBackend::Flat => Arc::new(FlatIndex::open(
            &get_flat_index_dir(base_dir),
            dimensions,
            normalize,
        )?),
        IndexBackend::Sqlite => Arc::new(SqliteIndex::open(
            &get_sqlite_path(base_dir),
            dimensions,
            normalize,
        )?),
    };

    tracing::debug!(
        "Opened {:?} index for '{}' ({} dimensions)",
        config.index.backend,
        config.name,
        dimensions
    );

    Ok(index)
}

/// Scale a vector to unit length in place. Zero vectors are left alone.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn check_dimension(expected: usize, vector: &[f32]) -> AppResult<()> {
    if vector.len() != expected {
        return Err(AppError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Encode a vector as little-endian f32 bytes.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes.
pub fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Datastore(format!(
            "Invalid embedding byte length {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Sort `(id, similarity)` pairs best first, ties by ascending id, and keep
/// the first `top_k`.
pub(crate) fn rank(scores: &mut Vec<(u64, f32)>, top_k: usize) {
    scores.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scores.truncate(top_k);
}
