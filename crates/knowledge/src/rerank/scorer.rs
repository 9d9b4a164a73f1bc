//! Relevance scorers used by the reranker.

use crate::embeddings::Embedder;
use crate::vector_index::dot;
use async_trait::async_trait;
use sift_core::AppResult;
use std::collections::HashSet;

/// Scores `(query, text)` pairs; higher means more relevant.
///
/// Scores must depend only on the pair, never on which other texts share the
/// call, so batch boundaries cannot change a ranking.
#[async_trait]
pub trait RelevanceScorer: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// One score per text, in input order.
    async fn score(&self, query: &str, texts: &[String]) -> AppResult<Vec<f32>>;
}

/// Token-overlap F1 with a bonus for shared bigrams.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalScorer;

const BIGRAM_WEIGHT: f32 = 0.25;

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn bigrams(terms: &[String]) -> HashSet<(&str, &str)> {
    terms
        .windows(2)
        .map(|w| (w[0].as_str(), w[1].as_str()))
        .collect()
}

impl LexicalScorer {
    pub fn score_pair(query: &str, text: &str) -> f32 {
        let query_terms = terms(query);
        let text_terms = terms(text);

        let q: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
        let t: HashSet<&str> = text_terms.iter().map(String::as_str).collect();
        if q.is_empty() || t.is_empty() {
            return 0.0;
        }

        let overlap = q.intersection(&t).count() as f32;
        if overlap == 0.0 {
            return 0.0;
        }
        let precision = overlap / t.len() as f32;
        let recall = overlap / q.len() as f32;
        let f1 = 2.0 * precision * recall / (precision + recall);

        let qb = bigrams(&query_terms);
        let bonus = if qb.is_empty() {
            0.0
        } else {
            let tb = bigrams(&text_terms);
            qb.intersection(&tb).count() as f32 / qb.len() as f32
        };

        f1 + BIGRAM_WEIGHT * bonus
    }
}

#[async_trait]
impl RelevanceScorer for LexicalScorer {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, query: &str, texts: &[String]) -> AppResult<Vec<f32>> {
        Ok(texts
            .iter()
            .map(|text| Self::score_pair(query, text))
            .collect())
    }
}

/// Cosine similarity between query and text embeddings.
#[derive(Debug, Clone)]
pub struct EmbeddingScorer {
    embedder: Embedder,
}

impl EmbeddingScorer {
    pub fn new(embedder: Embedder) -> Self {
        Self { embedder }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let na = dot(a, a).sqrt();
    let nb = dot(b, b).sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}

#[async_trait]
impl RelevanceScorer for EmbeddingScorer {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn score(&self, query: &str, texts: &[String]) -> AppResult<Vec<f32>> {
        let query_vec = self.embedder.embed_query(query).await?;
        let text_vecs = self.embedder.embed_documents(texts).await?;
        Ok(text_vecs.iter().map(|v| cosine(&query_vec, v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingConfig;

    #[test]
    fn test_lexical_prefers_overlap() {
        let exact = LexicalScorer::score_pair("rust borrow checker", "the rust borrow checker");
        let partial = LexicalScorer::score_pair("rust borrow checker", "rust is a language");
        let none = LexicalScorer::score_pair("rust borrow checker", "sourdough bread");

        assert!(exact > partial);
        assert!(partial > none);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn test_lexical_bigram_bonus() {
        let ordered = LexicalScorer::score_pair("borrow checker", "borrow checker rules");
        let shuffled = LexicalScorer::score_pair("borrow checker", "checker rules borrow");
        assert!(ordered > shuffled);
    }

    #[test]
    fn test_lexical_empty() {
        assert_eq!(LexicalScorer::score_pair("", "text"), 0.0);
        assert_eq!(LexicalScorer::score_pair("query", "  "), 0.0);
    }

    #[tokio::test]
    async fn test_embedding_scorer() {
        let embedder = Embedder::from_config(&EmbeddingConfig::default()).unwrap();
        let scorer = EmbeddingScorer::new(embedder);

        let scores = scorer
            .score(
                "cats mammals",
                &["cats are mammals".to_string(), "stars are far".to_string()],
            )
            .await
            .unwrap();

        assert!((scores[0] - 1.0).abs() < 1e-5);
        assert!(scores[1] < scores[0]);
    }
}
