//! The task strategies and their shared request/result types.

pub mod chatting;
pub mod keyword_rag;
pub mod question;
pub mod summarization;

pub use chatting::{ChatResult, ChattingStrategy, ParsedChat, SourceDocument};
pub use keyword_rag::{ExpansionChunk, KeywordRagStrategy, KeywordSummaryResult, SeedMatch};
pub use question::{Complexity, QaPair, QuestionStrategy, QuestionsResult};
pub use summarization::{SummarizationStrategy, SummaryResult};

use regex::Regex;
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};
use sift_knowledge::Chunk;
use std::fmt;
use std::sync::LazyLock;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("valid regex"));

/// Remove `<think>...</think>` blocks, then any remaining markup tags.
pub(crate) fn strip_tags(text: &str) -> String {
    let without_think = THINK_BLOCK.replace_all(text, "");
    ANY_TAG.replace_all(&without_think, "").into_owned()
}

/// Run blocking work (history files, snapshot scans) off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Task(format!("Background task failed: {}", e)))?
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Chatting,
    Summarization,
    Question,
    KeywordRag,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Chatting => "chatting",
            Self::Summarization => "summarization",
            Self::Question => "question",
            Self::KeywordRag => "keyword_rag",
        };
        f.write_str(name)
    }
}

/// Input to [`Strategy::run`]. Each variant is served by one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    Chat {
        question: String,
        conversation_id: String,
    },
    Summarize {
        text: String,
        /// `short`, `medium` or `long`
        length: String,
        verbose: bool,
        overview_level: Option<String>,
    },
    Questions {
        chunk: Chunk,
        count: usize,
        /// Level for this request only; the strategy's own level when `None`
        complexity: Option<String>,
    },
    KeywordSummary {
        keyword: String,
    },
}

impl TaskRequest {
    /// The strategy able to serve this request.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Chat { .. } => StrategyKind::Chatting,
            Self::Summarize { .. } => StrategyKind::Summarization,
            Self::Questions { .. } => StrategyKind::Question,
            Self::KeywordSummary { .. } => StrategyKind::KeywordRag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyResult {
    Chat(ChatResult),
    Summary(SummaryResult),
    Questions(QuestionsResult),
    KeywordSummary(KeywordSummaryResult),
}

impl StrategyResult {
    pub fn detected_language(&self) -> &str {
        match self {
            Self::Chat(r) => &r.detected_language,
            Self::Summary(r) => &r.detected_language,
            Self::Questions(r) => &r.detected_language,
            Self::KeywordSummary(r) => &r.detected_language,
        }
    }

    /// The main generated text of the result.
    pub fn text(&self) -> &str {
        match self {
            Self::Chat(r) => &r.answer,
            Self::Summary(r) => &r.text,
            Self::Questions(r) => &r.raw_output,
            Self::KeywordSummary(r) => &r.summary,
        }
    }
}

/// The closed set of strategies a [`crate::TaskProcessor`] can run.
#[derive(Debug)]
pub enum Strategy {
    Chatting(ChattingStrategy),
    Summarization(SummarizationStrategy),
    Question(QuestionStrategy),
    KeywordRag(KeywordRagStrategy),
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Chatting(_) => StrategyKind::Chatting,
            Self::Summarization(_) => StrategyKind::Summarization,
            Self::Question(_) => StrategyKind::Question,
            Self::KeywordRag(_) => StrategyKind::KeywordRag,
        }
    }

    /// Run a request.
    ///
    /// # Errors
    /// `AppError::Task` when the request belongs to a different strategy, and
    /// `AppError::UnknownComplexity` when a question request names a level
    /// that cannot be resolved.
    pub async fn run(&self, request: TaskRequest) -> AppResult<StrategyResult> {
        match (self, request) {
            (
                Self::Chatting(strategy),
                TaskRequest::Chat {
                    question,
                    conversation_id,
                },
            ) => strategy
                .run(&question, &conversation_id)
                .await
                .map(StrategyResult::Chat),
            (
                Self::Summarization(strategy),
                TaskRequest::Summarize {
                    text,
                    length,
                    verbose,
                    overview_level,
                },
            ) => strategy
                .run(&text, &length, verbose, overview_level.as_deref())
                .await
                .map(StrategyResult::Summary),
            (
                Self::Question(strategy),
                TaskRequest::Questions {
                    chunk,
                    count,
                    complexity,
                },
            ) => {
                let level = complexity.as_deref().map(Complexity::resolve).transpose()?;
                strategy
                    .run(&chunk, count, level)
                    .await
                    .map(StrategyResult::Questions)
            }
            (Self::KeywordRag(strategy), TaskRequest::KeywordSummary { keyword }) => strategy
                .run(&keyword)
                .await
                .map(StrategyResult::KeywordSummary),
            (strategy, request) => Err(AppError::Task(format!(
                "The {} strategy cannot run a {} request",
                strategy.kind(),
                request.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("<think>\nplan the answer\n</think>RESPONSE: <b>yes</b>"),
            "RESPONSE: yes"
        );
        assert_eq!(strip_tags("<THINK>x</THINK>kept"), "kept");
        assert_eq!(strip_tags("a < b and c > d"), "a < b and c > d");
    }

    #[test]
    fn test_request_kinds() {
        let request = TaskRequest::KeywordSummary {
            keyword: "cats".to_string(),
        };
        assert_eq!(request.kind(), StrategyKind::KeywordRag);
        assert_eq!(StrategyKind::KeywordRag.to_string(), "keyword_rag");
    }
}
