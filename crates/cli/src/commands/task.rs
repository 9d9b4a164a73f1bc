//! Task commands: chat, summarize, questions, keyword.
//!
//! Each command builds one strategy, installs it in a [`TaskProcessor`] and
//! dispatches a single request (or, for interactive chat, one per line).

use clap::Args;
use sift_core::{config::AppConfig, AppError, AppResult};
use sift_knowledge::document::load_document;
use sift_knowledge::Retriever;
use sift_prompt::{load_catalog, PromptCatalog};
use sift_tasks::history::new_conversation_id;
use sift_tasks::{
    ChatResult, ChattingStrategy, ConversationHistoryManager, Generator, KeywordRagStrategy,
    LanguageDetector, QuestionStrategy, Strategy, StrategyResult, SummarizationStrategy,
    TaskProcessor, TaskRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Pieces every strategy needs, resolved from the app config.
struct TaskEnv {
    generator: Generator,
    detector: LanguageDetector,
    catalog: Arc<PromptCatalog>,
}

impl TaskEnv {
    fn load(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            generator: Generator::from_config(config)?,
            detector: LanguageDetector::from_settings(&config.rag),
            catalog: Arc::new(load_catalog(&config.workspace)?),
        })
    }
}

fn print_json(result: &StrategyResult) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

/// Ask questions about a knowledge base, with conversation memory
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Knowledge base name
    pub base: String,

    /// Question to ask; omit to read questions from stdin, one per line
    pub question: Option<String>,

    /// Conversation to continue (a new one is started if omitted)
    #[arg(long)]
    pub conversation: Option<String>,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Show the reasoning and sources sections
    #[arg(long)]
    pub show_reasoning: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command for base '{}'", self.base);

        let env = TaskEnv::load(config)?;
        let history = Arc::new(ConversationHistoryManager::new(
            config.history_dir(),
            config.rag.history_window,
        ));
        let strategy = ChattingStrategy::new(
            Retriever::open(&config.workspace, &self.base)?,
            env.generator,
            history,
            env.detector,
            env.catalog,
        )
        .with_top_k(self.top_k.unwrap_or(config.rag.top_k))
        .with_history_limit(config.rag.history_limit);
        let processor = TaskProcessor::with_strategy(Strategy::Chatting(strategy));

        let conversation_id = self
            .conversation
            .clone()
            .unwrap_or_else(new_conversation_id);

        match &self.question {
            Some(question) => self.ask(&processor, question, &conversation_id).await,
            None => {
                eprintln!("Conversation {} (Ctrl-D to finish)", conversation_id);
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Some(line) = lines.next_line().await? {
                    let question = line.trim();
                    if question.is_empty() {
                        continue;
                    }
                    // Keep the session alive across a failed turn
                    if let Err(e) = self.ask(&processor, question, &conversation_id).await {
                        eprintln!("Error: {}", e);
                    }
                }
                Ok(())
            }
        }
    }

    async fn ask(
        &self,
        processor: &TaskProcessor,
        question: &str,
        conversation_id: &str,
    ) -> AppResult<()> {
        let result = processor
            .execute_task(TaskRequest::Chat {
                question: question.to_string(),
                conversation_id: conversation_id.to_string(),
            })
            .await?;

        if self.json {
            return print_json(&result);
        }
        if let StrategyResult::Chat(chat) = &result {
            self.print_chat(chat);
        }
        Ok(())
    }

    fn print_chat(&self, chat: &ChatResult) {
        println!("{}", chat.answer);

        if self.show_reasoning && !chat.reasoning.is_empty() {
            println!();
            println!("Reasoning:");
            println!("{}", chat.reasoning);
        }

        let cited: Vec<_> = chat
            .source_documents
            .iter()
            .filter(|doc| chat.source_ids.contains(&doc.index))
            .collect();
        if !cited.is_empty() {
            println!();
            println!("Sources:");
            for doc in cited {
                let page = doc.page.map(|p| format!(", page {}", p)).unwrap_or_default();
                println!("- [{}] doc {}{}", doc.index, doc.source_id, page);
            }
        }

        if self.conversation.is_none() && self.question.is_some() {
            eprintln!();
            eprintln!("Continue with --conversation {}", chat.conversation_id);
        }
    }
}

/// Summarize a document
#[derive(Args, Debug)]
pub struct SummarizeCommand {
    /// Document to summarize (.txt, .md, or .json pages)
    pub file: PathBuf,

    /// Summary length (short, medium, long)
    #[arg(short, long, default_value = "medium")]
    pub length: String,

    /// Ask the model to explain its summary
    #[arg(long)]
    pub reasoning: bool,

    /// Overview level instead of a flat summary (e.g. executive, detailed)
    #[arg(long)]
    pub overview: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SummarizeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing summarize command for {:?}", self.file);

        let document = load_document(&self.file)?;
        let env = TaskEnv::load(config)?;
        let processor = TaskProcessor::with_strategy(Strategy::Summarization(
            SummarizationStrategy::new(env.generator, env.detector, env.catalog),
        ));

        let result = processor
            .execute_task(TaskRequest::Summarize {
                text: document.text(),
                length: self.length.clone(),
                verbose: self.reasoning,
                overview_level: self.overview.clone(),
            })
            .await?;

        if self.json {
            print_json(&result)
        } else {
            println!("{}", result.text());
            Ok(())
        }
    }
}

/// Generate study questions from indexed chunks
#[derive(Args, Debug)]
pub struct QuestionsCommand {
    /// Knowledge base name
    pub base: String,

    /// Positions of the chunks to use, in index order
    #[arg(long = "chunk", default_value = "0")]
    pub chunks: Vec<usize>,

    /// Questions per chunk
    #[arg(short = 'n', long, default_value = "5")]
    pub count: usize,

    /// Difficulty (easy, medium, hard, or a synonym such as "challenging")
    #[arg(long)]
    pub complexity: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QuestionsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing questions command for base '{}'", self.base);

        let snapshot = Retriever::open(&config.workspace, &self.base)?
            .snapshot()
            .await?;

        let env = TaskEnv::load(config)?;
        let mut strategy = QuestionStrategy::new(env.generator, env.detector, env.catalog);
        strategy.set_complexity(&config.rag.complexity)?;
        let processor = TaskProcessor::with_strategy(Strategy::Question(strategy));

        for &position in &self.chunks {
            let chunk = snapshot.get(position).ok_or_else(|| {
                AppError::Task(format!(
                    "Chunk {} out of range; '{}' holds {} chunks",
                    position,
                    self.base,
                    snapshot.len()
                ))
            })?;

            let result = processor
                .execute_task(TaskRequest::Questions {
                    chunk: chunk.chunk.clone(),
                    count: self.count,
                    complexity: self.complexity.clone(),
                })
                .await?;

            if self.json {
                print_json(&result)?;
                continue;
            }
            if let StrategyResult::Questions(questions) = &result {
                println!(
                    "Chunk {} ({}#{}, {}):",
                    position, questions.source_id, questions.chunk_index, questions.complexity
                );
                for (i, pair) in questions.pairs.iter().enumerate() {
                    println!("Q{}: {}", i + 1, pair.question);
                    println!("A{}: {}", i + 1, pair.answer);
                }
                println!();
            }
        }

        Ok(())
    }
}

/// Summarize what a knowledge base says about a keyword
#[derive(Args, Debug)]
pub struct KeywordCommand {
    /// Knowledge base name
    pub base: String,

    /// Keyword to look for (typos are tolerated)
    pub keyword: String,

    /// Similar chunks added to the keyword match
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum fuzzy match score, 0-100
    #[arg(long)]
    pub threshold: Option<u8>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KeywordCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing keyword command for base '{}'", self.base);

        let env = TaskEnv::load(config)?;
        let threshold = self.threshold.unwrap_or(config.rag.fuzzy_threshold);
        let strategy = KeywordRagStrategy::new(
            Retriever::open(&config.workspace, &self.base)?,
            env.generator,
            env.detector,
            env.catalog,
        )
        .await?
        .with_top_k(self.top_k.unwrap_or(config.rag.top_k))
        .with_threshold(f64::from(threshold));
        let processor = TaskProcessor::with_strategy(Strategy::KeywordRag(strategy));

        let result = processor
            .execute_task(TaskRequest::KeywordSummary {
                keyword: self.keyword.clone(),
            })
            .await?;

        if self.json {
            return print_json(&result);
        }
        if let StrategyResult::KeywordSummary(summary) = &result {
            eprintln!(
                "Matched {}#{} (score {:.0}) plus {} similar chunks",
                summary.seed.source_id,
                summary.seed.chunk_index,
                summary.match_score,
                summary.expansion.len()
            );
            println!("{}", summary.summary);
        }
        Ok(())
    }
}
