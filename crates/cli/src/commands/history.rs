//! Conversation history commands.

use clap::{Args, Subcommand};
use sift_core::{config::AppConfig, AppResult};
use sift_tasks::ConversationHistoryManager;

/// Manage stored conversations
#[derive(Args, Debug)]
pub struct HistoryCommand {
    #[command(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List stored conversations
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a conversation
    Show {
        conversation: String,

        /// Only the last N messages
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every message, keeping the conversation
    Clear { conversation: String },
    /// Delete the conversation file
    Delete { conversation: String },
}

impl HistoryCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        // Show reads straight from disk, so the window must not cut it short
        let history = ConversationHistoryManager::new(config.history_dir(), usize::MAX);

        match &self.action {
            HistoryAction::List { json } => {
                let summaries = history
                    .conversation_ids()?
                    .iter()
                    .map(|id| history.summary(id))
                    .collect::<AppResult<Vec<_>>>()?;

                if *json {
                    println!("{}", serde_json::to_string_pretty(&summaries)?);
                } else if summaries.is_empty() {
                    println!("No conversations in {:?}", history.dir());
                } else {
                    for summary in summaries {
                        let updated = summary
                            .last_updated
                            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_else(|| "-".to_string());
                        let preview = summary
                            .last_message
                            .as_deref()
                            .unwrap_or_default()
                            .replace('\n', " ");
                        println!(
                            "{}  {:>4} messages  {}  {}",
                            summary.conversation_id, summary.message_count, updated, preview
                        );
                    }
                }
            }
            HistoryAction::Show {
                conversation,
                limit,
                json,
            } => {
                let messages = history.messages(conversation, limit.unwrap_or(usize::MAX))?;
                if *json {
                    println!("{}", serde_json::to_string_pretty(&messages)?);
                } else {
                    for message in messages {
                        println!(
                            "[{}] {}: {}",
                            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            message.role.label(),
                            message.content
                        );
                    }
                }
            }
            HistoryAction::Clear { conversation } => {
                history.clear(conversation)?;
                println!("Conversation '{}' cleared", conversation);
            }
            HistoryAction::Delete { conversation } => {
                if history.delete(conversation)? {
                    println!("Conversation '{}' deleted", conversation);
                } else {
                    println!("Conversation '{}' not found", conversation);
                }
            }
        }

        Ok(())
    }
}
