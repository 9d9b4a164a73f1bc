//! Task strategies for sift.
//!
//! A [`TaskProcessor`] holds one active [`Strategy`] and dispatches
//! [`TaskRequest`]s to it. The four strategies share a [`Generator`] (an LLM
//! client plus sampling options), a [`LanguageDetector`] and the prompt
//! catalog; the chat strategy adds a [`ConversationHistoryManager`] and the
//! retrieval strategies a `sift_knowledge::Retriever`.
//!
//! # Example
//! ```no_run
//! use sift_tasks::{Strategy, SummarizationStrategy, TaskProcessor, TaskRequest};
//! # async fn example(strategy: SummarizationStrategy) -> sift_core::AppResult<()> {
//! let mut processor = TaskProcessor::new();
//! processor.set_strategy(Strategy::Summarization(strategy));
//!
//! let result = processor
//!     .execute_task(TaskRequest::Summarize {
//!         text: "Cats are mammals.".to_string(),
//!         length: "short".to_string(),
//!         verbose: false,
//!         overview_level: None,
//!     })
//!     .await?;
//! println!("{}", result.detected_language());
//! # Ok(())
//! # }
//! ```

pub mod fuzzy;
pub mod generator;
pub mod history;
pub mod language;
pub mod processor;
pub mod strategies;

#[cfg(test)]
mod tests;

pub use generator::Generator;
pub use history::{ConversationHistory, ConversationHistoryManager, ConversationSummary, Message, Role};
pub use language::LanguageDetector;
pub use processor::TaskProcessor;
pub use strategies::{
    ChatResult, ChattingStrategy, Complexity, KeywordRagStrategy, KeywordSummaryResult,
    QaPair, QuestionStrategy, QuestionsResult, Strategy, StrategyKind, StrategyResult,
    SummarizationStrategy, SummaryResult, TaskRequest,
};
