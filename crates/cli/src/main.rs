//! sift CLI
//!
//! Main entry point for the sift command-line tool: index documents into a
//! knowledge base, then chat, summarize, generate questions or run keyword
//! summaries over it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    ChatCommand, CleanCommand, HistoryCommand, IndexCommand, KeywordCommand, QuestionsCommand,
    SearchCommand, StatsCommand, SummarizeCommand,
};
use sift_core::logging::{self, LogFormat};
use sift_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    LogFormat::parse(s).map_err(|e| e.to_string())
}

/// sift - retrieval-augmented tasks over your documents
#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(about = "Retrieval-augmented chat, summaries and quizzes over local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "SIFT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log line format (pretty, json)
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, static)
    #[arg(short, long, global = true, env = "SIFT_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "SIFT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index documents into a knowledge base
    Index(IndexCommand),

    /// Retrieve the chunks most relevant to a query
    Search(SearchCommand),

    /// Show knowledge base statistics
    Stats(StatsCommand),

    /// Drop a knowledge base's index
    Clean(CleanCommand),

    /// Ask questions about a knowledge base, with conversation memory
    Chat(ChatCommand),

    /// Summarize a document
    Summarize(SummarizeCommand),

    /// Generate study questions from indexed chunks
    Questions(QuestionsCommand),

    /// Summarize what a knowledge base says about a keyword
    Keyword(KeywordCommand),

    /// Manage stored conversations
    History(HistoryCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Index(_) => "index",
            Self::Search(_) => "search",
            Self::Stats(_) => "stats",
            Self::Clean(_) => "clean",
            Self::Chat(_) => "chat",
            Self::Summarize(_) => "summarize",
            Self::Questions(_) => "questions",
            Self::Keyword(_) => "keyword",
            Self::History(_) => "history",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.log_format,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format)?;
    config.validate()?;

    tracing::info!("sift starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_sift_dir()?;

    let span = tracing::info_span!("command", name = cli.command.name());
    let _guard = span.enter();

    let result = match cli.command {
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::Clean(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Summarize(cmd) => cmd.execute(&config).await,
        Commands::Questions(cmd) => cmd.execute(&config).await,
        Commands::Keyword(cmd) => cmd.execute(&config).await,
        Commands::History(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
