//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A bounded, contiguous slice of a source document.
///
/// Produced by the chunker and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content
    pub text: String,

    /// Source document ID
    pub source_id: String,

    /// Position within the source, increasing in source order
    pub chunk_index: u32,

    /// Metadata (token span, page number, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Chunk {
    pub fn new(source_id: impl Into<String>, chunk_index: u32, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            chunk_index,
            metadata: serde_json::json!({}),
        }
    }

    /// Page number recorded by the document loader, if any.
    pub fn page(&self) -> Option<u64> {
        self.metadata.get("page").and_then(|p| p.as_u64())
    }
}

/// A chunk together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }

    pub fn text(&self) -> &str {
        &self.chunk.text
    }
}

/// A search hit. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedCandidate {
    /// Internal index id of the hit
    pub id: u64,

    pub chunk: EmbeddedChunk,

    /// Inner-product similarity to the query
    pub similarity: f32,
}

/// A search hit re-scored by the reranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedCandidate {
    pub candidate: RetrievedCandidate,

    pub rerank_score: f32,

    /// 1-based rank after reranking
    pub rerank_position: usize,
}

impl RerankedCandidate {
    pub fn text(&self) -> &str {
        self.candidate.chunk.text()
    }
}

/// A retrieval result, reranked or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Retrieved {
    Plain(RetrievedCandidate),
    Reranked(RerankedCandidate),
}

impl Retrieved {
    pub fn candidate(&self) -> &RetrievedCandidate {
        match self {
            Self::Plain(c) => c,
            Self::Reranked(r) => &r.candidate,
        }
    }

    pub fn chunk(&self) -> &Chunk {
        &self.candidate().chunk.chunk
    }

    pub fn text(&self) -> &str {
        &self.chunk().text
    }

    pub fn similarity(&self) -> f32 {
        self.candidate().similarity
    }

    pub fn rerank_score(&self) -> Option<f32> {
        match self {
            Self::Plain(_) => None,
            Self::Reranked(r) => Some(r.rerank_score),
        }
    }
}

/// One page of a loaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPage {
    pub page: u32,
    pub text: String,
}

/// A source document ready for chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier derived from the path
    pub source_id: String,

    /// Where the document was read from
    pub path: PathBuf,

    /// Page-structured content; a plain text file is a single page
    pub pages: Vec<DocumentPage>,
}

impl Document {
    /// Full text with pages separated by blank lines.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Cooperative cancellation flag checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Statistics from an indexing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub indexed_total: usize,
    pub duration_secs: f64,
}
