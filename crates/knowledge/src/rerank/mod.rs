//! Second-stage reranking of retrieved candidates.
//!
//! The [`Reranker`] truncates the query and candidate texts, scores them in
//! fixed-size batches through a [`RelevanceScorer`], and stable-sorts by score
//! so ties keep their retrieval order.

pub mod http;
pub mod scorer;

pub use http::HttpRerankScorer;
pub use scorer::{EmbeddingScorer, LexicalScorer, RelevanceScorer};

use crate::embeddings::Embedder;
use crate::types::{CancelFlag, RerankedCandidate, RetrievedCandidate};
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};
use std::sync::Arc;

/// Which scorer backs the reranker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    #[default]
    Lexical,
    Embedding,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub scorer: ScorerKind,

    /// Base URL for the `http` scorer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,

    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retrieve `top_k * candidate_multiplier` candidates before reranking
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

fn default_max_query_chars() -> usize {
    512
}

fn default_max_text_chars() -> usize {
    2048
}

fn default_batch_size() -> usize {
    16
}

fn default_candidate_multiplier() -> usize {
    2
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scorer: ScorerKind::default(),
            endpoint: None,
            max_query_chars: default_max_query_chars(),
            max_text_chars: default_max_text_chars(),
            batch_size: default_batch_size(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
    max_query_chars: usize,
    max_text_chars: usize,
    batch_size: usize,
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>, config: &RerankConfig) -> Self {
        Self {
            scorer,
            max_query_chars: config.max_query_chars,
            max_text_chars: config.max_text_chars,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Build the configured scorer. The `embedding` scorer reuses `embedder`.
    pub fn from_config(config: &RerankConfig, embedder: &Embedder) -> AppResult<Self> {
        let scorer: Arc<dyn RelevanceScorer> = match config.scorer {
            ScorerKind::Lexical => Arc::new(LexicalScorer),
            ScorerKind::Embedding => Arc::new(EmbeddingScorer::new(embedder.clone())),
            ScorerKind::Http => {
                let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                    AppError::Config("rerank.endpoint is required for the http scorer".to_string())
                })?;
                Arc::new(HttpRerankScorer::new(endpoint)?)
            }
        };
        Ok(Self::new(scorer, config))
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievedCandidate>,
    ) -> AppResult<Vec<RerankedCandidate>> {
        self.rerank_cancellable(query, candidates, &CancelFlag::new())
            .await
    }

    /// Rerank, checking `cancel` between scoring batches.
    pub async fn rerank_cancellable(
        &self,
        query: &str,
        candidates: Vec<RetrievedCandidate>,
        cancel: &CancelFlag,
    ) -> AppResult<Vec<RerankedCandidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query = truncate_chars(query, self.max_query_chars);
        let texts: Vec<String> = candidates
            .iter()
            .map(|c| truncate_chars(c.chunk.text(), self.max_text_chars))
            .collect();

        let mut scores = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled(format!(
                    "reranking stopped after {} of {} candidates",
                    scores.len(),
                    texts.len()
                )));
            }

            let batch_scores = self.scorer.score(&query, batch).await?;
            if batch_scores.len() != batch.len() {
                return Err(AppError::Knowledge(format!(
                    "Scorer '{}' returned {} scores for {} texts",
                    self.scorer.name(),
                    batch_scores.len(),
                    batch.len()
                )));
            }
            scores.extend(batch_scores);
        }

        let mut scored: Vec<(RetrievedCandidate, f32)> = candidates.into_iter().zip(scores).collect();
        // sort_by is stable: equal scores keep retrieval order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let reranked: Vec<RerankedCandidate> = scored
            .into_iter()
            .enumerate()
            .map(|(i, (candidate, rerank_score))| RerankedCandidate {
                candidate,
                rerank_score,
                rerank_position: i + 1,
            })
            .collect();

        tracing::debug!(
            "Reranked {} candidates with '{}' scorer",
            reranked.len(),
            self.scorer.name()
        );

        Ok(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingConfig;
    use crate::types::{Chunk, EmbeddedChunk};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn candidate(id: u64, text: &str) -> RetrievedCandidate {
        RetrievedCandidate {
            id,
            chunk: EmbeddedChunk::new(Chunk::new("src", id as u32, text), vec![0.0]),
            similarity: 1.0 - id as f32 * 0.1,
        }
    }

    fn lexical(batch_size: usize) -> Reranker {
        Reranker::new(
            Arc::new(LexicalScorer),
            &RerankConfig {
                batch_size,
                ..Default::default()
            },
        )
    }

    /// Records exactly what the reranker sends to the scorer.
    #[derive(Debug, Default)]
    struct Recording {
        seen: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl RelevanceScorer for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn score(&self, query: &str, texts: &[String]) -> AppResult<Vec<f32>> {
            self.seen.lock().push((query.to_string(), texts.to_vec()));
            Ok(vec![0.0; texts.len()])
        }
    }

    #[tokio::test]
    async fn test_sorted_with_positions() {
        let candidates = vec![
            candidate(0, "bread recipes"),
            candidate(1, "rust borrow checker explained"),
            candidate(2, "rust language"),
        ];

        let out = lexical(16)
            .rerank("rust borrow checker", candidates)
            .await
            .unwrap();

        let ids: Vec<u64> = out.iter().map(|r| r.candidate.id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        let positions: Vec<usize> = out.iter().map(|r| r.rerank_position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(out.windows(2).all(|w| w[0].rerank_score >= w[1].rerank_score));
    }

    #[tokio::test]
    async fn test_ties_keep_retrieval_order_and_idempotent() {
        let candidates: Vec<_> = (0..5).map(|i| candidate(i, "same text")).collect();
        let reranker = lexical(2);

        let first = reranker.rerank("same", candidates).await.unwrap();
        let ids: Vec<u64> = first.iter().map(|r| r.candidate.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);

        let again = reranker
            .rerank("same", first.iter().map(|r| r.candidate.clone()).collect())
            .await
            .unwrap();
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn test_batch_size_does_not_change_ranking() {
        let candidates: Vec<_> = [
            "alpha beta",
            "beta gamma",
            "alpha beta gamma",
            "delta",
            "gamma alpha",
            "beta",
            "alpha",
        ]
        .iter()
        .enumerate()
        .map(|(i, t)| candidate(i as u64, t))
        .collect();

        let whole = lexical(100).rerank("alpha beta", candidates.clone()).await.unwrap();
        for batch_size in [1, 2, 3] {
            let batched = lexical(batch_size)
                .rerank("alpha beta", candidates.clone())
                .await
                .unwrap();
            assert_eq!(batched, whole);
        }
    }

    #[tokio::test]
    async fn test_truncation() {
        let scorer = Arc::new(Recording::default());
        let reranker = Reranker::new(
            scorer.clone(),
            &RerankConfig {
                max_query_chars: 3,
                max_text_chars: 4,
                batch_size: 1,
                ..Default::default()
            },
        );

        reranker
            .rerank("ثدييات", vec![candidate(0, "abcdefgh"), candidate(1, "xy")])
            .await
            .unwrap();

        let seen = scorer.seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "ثدي");
        assert_eq!(seen[0].1, vec!["abcd".to_string()]);
        assert_eq!(seen[1].1, vec!["xy".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_and_cancelled() {
        let reranker = lexical(4);
        assert!(reranker.rerank("q", Vec::new()).await.unwrap().is_empty());

        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = reranker
            .rerank_cancellable("q", vec![candidate(0, "q")], &cancel)
            .await;
        assert!(matches!(result, Err(AppError::Cancelled(_))));
    }

    #[test]
    fn test_from_config() {
        let embedder = Embedder::from_config(&EmbeddingConfig::default()).unwrap();

        let config = RerankConfig {
            scorer: ScorerKind::Embedding,
            ..Default::default()
        };
        assert_eq!(
            Reranker::from_config(&config, &embedder).unwrap().scorer_name(),
            "embedding"
        );

        let config = RerankConfig {
            scorer: ScorerKind::Http,
            ..Default::default()
        };
        assert!(matches!(
            Reranker::from_config(&config, &embedder),
            Err(AppError::Config(_))
        ));
    }
}
