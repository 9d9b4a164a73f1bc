//! Keyword-seeded summarization.
//!
//! A fuzzy keyword search over every indexed chunk picks a seed, semantic
//! retrieval expands it with similar chunks, and the generator summarizes
//! the combined excerpts.

use super::blocking;
use crate::fuzzy::{keyword_score, MAX_KEYWORD_CHARS};
use crate::generator::Generator;
use crate::language::LanguageDetector;
use serde::Serialize;
use sift_core::{AppError, AppResult};
use sift_knowledge::{ChunkSnapshot, Retrieved, Retriever};
use sift_prompt::{build_prompt, PromptCatalog};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// The chunk that best matched the keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedMatch {
    pub source_id: String,
    pub chunk_index: u32,
    pub page: Option<u64>,
    pub text: String,
    /// Fuzzy score, 0-100
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionChunk {
    pub source_id: String,
    pub chunk_index: u32,
    pub page: Option<u64>,
    pub text: String,
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl From<&Retrieved> for ExpansionChunk {
    fn from(r: &Retrieved) -> Self {
        Self {
            source_id: r.chunk().source_id.clone(),
            chunk_index: r.chunk().chunk_index,
            page: r.chunk().page(),
            text: r.text().to_string(),
            similarity: r.similarity(),
            rerank_score: r.rerank_score(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordSummaryResult {
    pub keyword: String,
    pub seed: SeedMatch,
    pub expansion: Vec<ExpansionChunk>,
    pub summary: String,
    pub match_score: f64,
    pub detected_language: String,
}

/// Index and score of the best-matching chunk, first wins on ties.
pub fn find_seed(keyword: &str, snapshot: &ChunkSnapshot) -> Option<(usize, f64)> {
    snapshot
        .iter()
        .enumerate()
        .map(|(i, chunk)| (i, keyword_score(keyword, chunk.text())))
        .fold(None, |best, (i, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((i, score)),
        })
}

fn page_label(page: Option<u64>) -> String {
    page.map(|p| p.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Seed block first, then each expansion chunk with its score.
pub fn format_keyword_context(seed: &SeedMatch, expansion: &[ExpansionChunk]) -> String {
    let mut blocks = vec![format!(
        "[KEYWORD MATCH - Page {}]\n{}",
        page_label(seed.page),
        seed.text
    )];

    for (i, chunk) in expansion.iter().enumerate() {
        let score = match chunk.rerank_score {
            Some(score) => format!("Rerank: {:.3}", score),
            None => format!("Similarity: {:.3}", chunk.similarity),
        };
        blocks.push(format!(
            "[SIMILAR CHUNK #{} - Page {} ({})]\n{}",
            i + 1,
            page_label(chunk.page),
            score,
            chunk.text
        ));
    }

    blocks.join("\n\n")
}

#[derive(Debug)]
pub struct KeywordRagStrategy {
    retriever: Retriever,
    generator: Generator,
    detector: LanguageDetector,
    catalog: Arc<PromptCatalog>,
    snapshot: ChunkSnapshot,
    top_k: usize,
    threshold: f64,
}

impl KeywordRagStrategy {
    /// Build the strategy, taking a snapshot of the retriever's index.
    pub async fn new(
        retriever: Retriever,
        generator: Generator,
        detector: LanguageDetector,
        catalog: Arc<PromptCatalog>,
    ) -> AppResult<Self> {
        let snapshot = retriever.snapshot().await?;
        tracing::debug!("Keyword search snapshot holds {} chunks", snapshot.len());

        Ok(Self {
            retriever,
            generator,
            detector,
            catalog,
            snapshot,
            top_k: 5,
            threshold: 70.0,
        })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Minimum fuzzy score (0-100) for the seed chunk.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn snapshot(&self) -> &ChunkSnapshot {
        &self.snapshot
    }

    /// Re-read the index, e.g. after more documents were indexed.
    pub async fn refresh_snapshot(&mut self) -> AppResult<usize> {
        self.snapshot = self.retriever.snapshot().await?;
        Ok(self.snapshot.len())
    }

    #[instrument(skip(self), fields(chunks = self.snapshot.len(), threshold = self.threshold))]
    pub async fn run(&self, keyword: &str) -> AppResult<KeywordSummaryResult> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::Task("Keyword must not be empty".to_string()));
        }
        if keyword.chars().count() > MAX_KEYWORD_CHARS {
            return Err(AppError::Task(format!(
                "Keyword is longer than {} characters",
                MAX_KEYWORD_CHARS
            )));
        }
        if self.snapshot.is_empty() {
            return Err(AppError::NoMatch(
                "the knowledge base has no indexed chunks".to_string(),
            ));
        }

        let seed = self.find_seed(keyword).await?;
        tracing::info!(
            "Keyword '{}' matched chunk {}#{} (score {:.1})",
            keyword,
            seed.source_id,
            seed.chunk_index,
            seed.score
        );

        let expansion: Vec<ExpansionChunk> = self
            .retriever
            .retrieve_similar(&seed.text, self.top_k + 1)
            .await?
            .iter()
            .filter(|r| r.text() != seed.text)
            .take(self.top_k)
            .map(ExpansionChunk::from)
            .collect();

        let language = self.detector.detect(&seed.text);

        let mut variables = HashMap::new();
        variables.insert("keyword".to_string(), keyword.to_string());
        variables.insert(
            "context".to_string(),
            format_keyword_context(&seed, &expansion),
        );
        let prompt = build_prompt(&self.catalog.keyword_summary, &language, variables)?;

        let summary = self.generator.generate(&prompt).await?;

        Ok(KeywordSummaryResult {
            keyword: keyword.to_string(),
            match_score: seed.score,
            seed,
            expansion,
            summary: summary.trim().to_string(),
            detected_language: language,
        })
    }

    async fn find_seed(&self, keyword: &str) -> AppResult<SeedMatch> {
        let snapshot = Arc::clone(&self.snapshot);
        let threshold = self.threshold;
        let owned_keyword = keyword.to_string();

        blocking(move || {
            let (index, score) = find_seed(&owned_keyword, &snapshot).ok_or_else(|| {
                AppError::NoMatch("the knowledge base has no indexed chunks".to_string())
            })?;

            if score < threshold {
                return Err(AppError::NoMatch(format!(
                    "no chunk matches '{}' (best score {:.1} < {})",
                    owned_keyword, score, threshold
                )));
            }

            let chunk = &snapshot[index].chunk;
            Ok(SeedMatch {
                source_id: chunk.source_id.clone(),
                chunk_index: chunk.chunk_index,
                page: chunk.page(),
                text: chunk.text.clone(),
                score,
            })
        })
        .await
    }
}
