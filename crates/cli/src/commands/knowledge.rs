//! Knowledge base commands: index, search, stats, clean.

use clap::Args;
use sift_core::{config::AppConfig, AppResult};
use sift_knowledge::config::{load_config, save_config, IndexBackend};
use sift_knowledge::{CancelFlag, IndexOptions, Retrieved, Retriever};
use std::path::PathBuf;

fn parse_backend(s: &str) -> Result<IndexBackend, String> {
    IndexBackend::parse(s).map_err(|e| e.to_string())
}

/// Index documents into a knowledge base
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Knowledge base name
    pub base: String,

    /// Files or directories to index (.txt, .md, .json pages)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Drop existing contents first
    #[arg(long)]
    pub reset: bool,

    /// Index backend (flat, sqlite)
    #[arg(long, value_parser = parse_backend)]
    pub backend: Option<IndexBackend>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command for base '{}'", self.base);

        if let Some(backend) = self.backend {
            let mut base_config = load_config(&config.workspace, &self.base)?;
            if base_config.index.backend != backend {
                tracing::info!("Switching base '{}' to the {:?} backend", self.base, backend);
                base_config.index.backend = backend;
                save_config(&config.workspace, &base_config)?;
            }
        }

        let cancel = CancelFlag::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted; stopping after the current batch");
                    cancel.cancel();
                }
            });
        }

        let options = IndexOptions {
            base_name: self.base.clone(),
            paths: self.paths.clone(),
            reset: self.reset,
        };
        let stats = sift_knowledge::index_paths(&config.workspace, options, &cancel).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!(
                "Indexed {} documents ({} chunks) in {:.2}s; '{}' now holds {} chunks",
                stats.documents, stats.chunks, stats.duration_secs, self.base, stats.indexed_total
            );
        }

        Ok(())
    }
}

/// Retrieve the chunks most relevant to a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Knowledge base name
    pub base: String,

    /// Query text
    pub query: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn print_hit(position: usize, hit: &Retrieved) {
    let page = hit
        .chunk()
        .page()
        .map(|p| format!(" page {}", p))
        .unwrap_or_default();
    let rerank = hit
        .rerank_score()
        .map(|s| format!(", rerank {:.3}", s))
        .unwrap_or_default();

    println!(
        "{}. [{}#{}{}] similarity {:.3}{}",
        position,
        hit.chunk().source_id,
        hit.chunk().chunk_index,
        page,
        hit.similarity(),
        rerank
    );
    println!("   {}", hit.text().replace('\n', "\n   "));
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command for base '{}'", self.base);

        let retriever = Retriever::open(&config.workspace, &self.base)?;
        let top_k = self.top_k.unwrap_or(config.rag.top_k);
        let hits = retriever.retrieve(&self.query, top_k).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&hits)?);
        } else if hits.is_empty() {
            println!("No results (is '{}' indexed?)", self.base);
        } else {
            for (i, hit) in hits.iter().enumerate() {
                print_hit(i + 1, hit);
            }
        }

        Ok(())
    }
}

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Knowledge base name
    pub base: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command for base '{}'", self.base);

        let stats = sift_knowledge::stats(&config.workspace, &self.base).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Knowledge base: {}", stats.base_name);
            println!("  Backend:    {:?}", stats.backend);
            println!("  Chunks:     {}", stats.chunks);
            println!(
                "  Embeddings: {}/{} ({} dims)",
                stats.embedding_provider, stats.embedding_model, stats.dimensions
            );
            println!(
                "  Reranking:  {}",
                if stats.rerank_enabled { "on" } else { "off" }
            );
        }

        Ok(())
    }
}

/// Drop a knowledge base's index, keeping its configuration
#[derive(Args, Debug)]
pub struct CleanCommand {
    /// Knowledge base name
    pub base: String,
}

impl CleanCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing clean command for base '{}'", self.base);

        sift_knowledge::clean(&config.workspace, &self.base).await?;
        println!("Knowledge base '{}' cleaned", self.base);

        Ok(())
    }
}
