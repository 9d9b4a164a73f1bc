//! Remote cross-encoder reranker.
//!
//! Speaks the text-embeddings-inference `/rerank` protocol:
//! `POST {query, texts}` returning `[{index, score}]`.

use super::scorer::RelevanceScorer;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};
use std::time::Duration;

const RERANK_ENDPOINT: &str = "/rerank";
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct HttpRerankScorer {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct RerankScore {
    index: usize,
    score: f32,
}

impl HttpRerankScorer {
    pub fn new(base_url: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::EmbeddingBackend(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Put scores back in input order; every index must appear exactly once.
fn order_scores(scores: Vec<RerankScore>, expected: usize) -> AppResult<Vec<f32>> {
    let mut ordered = vec![None; expected];
    for s in scores {
        match ordered.get_mut(s.index) {
            Some(slot @ None) => *slot = Some(s.score),
            _ => {
                return Err(AppError::EmbeddingBackend(format!(
                    "Reranker returned invalid or duplicate index {}",
                    s.index
                )))
            }
        }
    }

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.ok_or_else(|| {
                AppError::EmbeddingBackend(format!("Reranker returned no score for text {}", i))
            })
        })
        .collect()
}

#[async_trait]
impl RelevanceScorer for HttpRerankScorer {
    fn name(&self) -> &str {
        "http"
    }

    async fn score(&self, query: &str, texts: &[String]) -> AppResult<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}{}", self.base_url, RERANK_ENDPOINT);
        let response = self
            .client
            .post(&url)
            .json(&RerankRequest {
                query,
                texts,
                truncate: true,
            })
            .send()
            .await
            .map_err(|e| AppError::EmbeddingBackend(format!("Rerank request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingBackend(format!(
                "Reranker error ({}): {}",
                status, body
            )));
        }

        let scores: Vec<RerankScore> = response.json().await.map_err(|e| {
            AppError::EmbeddingBackend(format!("Failed to parse rerank response: {}", e))
        })?;

        order_scores(scores, texts.len())
    }
}
