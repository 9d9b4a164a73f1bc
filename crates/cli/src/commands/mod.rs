//! Command handlers for the sift CLI.

pub mod history;
pub mod knowledge;
pub mod task;

pub use history::HistoryCommand;
pub use knowledge::{CleanCommand, IndexCommand, SearchCommand, StatsCommand};
pub use task::{ChatCommand, KeywordCommand, QuestionsCommand, SummarizeCommand};
