//! Conversational question answering over a knowledge base.

use super::{blocking, strip_tags};
use crate::generator::Generator;
use crate::history::ConversationHistoryManager;
use crate::language::LanguageDetector;
use regex::Regex;
use serde::Serialize;
use sift_core::AppResult;
use sift_knowledge::{Retrieved, Retriever};
use sift_prompt::{build_prompt, PromptCatalog};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::instrument;

static SOURCE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// A retrieved chunk as cited in a chat answer. `index` is the 1-based
/// number used in the `[Source i | ...]` label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceDocument {
    pub index: usize,
    pub source_id: String,
    pub chunk_index: u32,
    pub page: Option<u64>,
    pub text: String,
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResult {
    pub answer: String,
    pub reasoning: String,
    /// Source numbers cited in the SOURCES section
    pub source_ids: Vec<usize>,
    pub source_documents: Vec<SourceDocument>,
    pub raw_response: String,
    pub conversation_id: String,
    pub detected_language: String,
}

/// The RESPONSE / REASONING / SOURCES sections of a model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedChat {
    pub answer: String,
    pub reasoning: String,
    pub sources: String,
    pub source_ids: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Response,
    Reasoning,
    Sources,
}

const HEADERS: [(&str, Section); 3] = [
    ("RESPONSE:", Section::Response),
    ("REASONING:", Section::Reasoning),
    ("SOURCES:", Section::Sources),
];

/// Match a section header at the start of a line, ignoring case and any
/// leading markdown emphasis. Returns the section and the rest of the line.
fn match_header(line: &str) -> Option<(Section, &str)> {
    let line = line.trim_start_matches(['*', '#', ' ']);
    HEADERS.iter().find_map(|(header, section)| {
        let prefix = line.get(..header.len())?;
        if prefix.eq_ignore_ascii_case(header) {
            let rest = line[header.len()..].trim_start_matches('*').trim();
            Some((*section, rest))
        } else {
            None
        }
    })
}

/// Split a model reply into its sections.
///
/// Never fails: missing sections are empty, and a reply without any header
/// becomes the whole answer.
pub fn parse_chat_response(raw: &str) -> ParsedChat {
    let cleaned = strip_tags(raw);
    let lines: Vec<&str> = cleaned
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut current: Option<Section> = None;
    let mut response = Vec::new();
    let mut reasoning = Vec::new();
    let mut sources = Vec::new();

    for line in &lines {
        let content = match match_header(line) {
            Some((section, rest)) => {
                current = Some(section);
                rest
            }
            None => line,
        };
        if content.is_empty() {
            continue;
        }
        match current {
            Some(Section::Response) => response.push(content),
            Some(Section::Reasoning) => reasoning.push(content),
            Some(Section::Sources) => sources.push(content),
            // Preamble before the first header
            None => {}
        }
    }

    if current.is_none() {
        return ParsedChat {
            answer: lines.join("\n"),
            ..ParsedChat::default()
        };
    }

    let sources = sources.join("\n");
    let source_ids = SOURCE_ID
        .find_iter(&sources)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    ParsedChat {
        answer: response.join("\n"),
        reasoning: reasoning.join("\n"),
        sources,
        source_ids,
    }
}

/// Render retrieved chunks with `[Source i | doc <source_id>]` labels.
pub fn format_context(retrieved: &[Retrieved]) -> String {
    retrieved
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[Source {} | doc {}]\n{}", i + 1, r.chunk().source_id, r.text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn source_documents(retrieved: &[Retrieved]) -> Vec<SourceDocument> {
    retrieved
        .iter()
        .enumerate()
        .map(|(i, r)| SourceDocument {
            index: i + 1,
            source_id: r.chunk().source_id.clone(),
            chunk_index: r.chunk().chunk_index,
            page: r.chunk().page(),
            text: r.text().to_string(),
            similarity: r.similarity(),
            rerank_score: r.rerank_score(),
        })
        .collect()
}

#[derive(Debug)]
pub struct ChattingStrategy {
    retriever: Retriever,
    generator: Generator,
    history: Arc<ConversationHistoryManager>,
    detector: LanguageDetector,
    catalog: Arc<PromptCatalog>,
    top_k: usize,
    history_limit: usize,
}

impl ChattingStrategy {
    pub fn new(
        retriever: Retriever,
        generator: Generator,
        history: Arc<ConversationHistoryManager>,
        detector: LanguageDetector,
        catalog: Arc<PromptCatalog>,
    ) -> Self {
        Self {
            retriever,
            generator,
            history,
            detector,
            catalog,
            top_k: 5,
            history_limit: 6,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Number of past messages injected into each prompt.
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn history(&self) -> &Arc<ConversationHistoryManager> {
        &self.history
    }

    #[instrument(skip(self, question), fields(top_k = self.top_k))]
    pub async fn run(&self, question: &str, conversation_id: &str) -> AppResult<ChatResult> {
        let (language, retrieved) = tokio::join!(
            async { self.detector.detect(question) },
            self.retriever.retrieve(question, self.top_k)
        );
        let retrieved = retrieved?;
        tracing::debug!("Retrieved {} chunks, answering in {}", retrieved.len(), language);

        let history = {
            let manager = Arc::clone(&self.history);
            let id = conversation_id.to_string();
            let limit = self.history_limit;
            blocking(move || manager.get_context(&id, limit)).await?
        };

        let mut variables = HashMap::new();
        variables.insert("history".to_string(), history);
        variables.insert("context".to_string(), format_context(&retrieved));
        variables.insert("question".to_string(), question.to_string());
        let prompt = build_prompt(&self.catalog.chat, &language, variables)?;

        let raw = match self.generator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Generation failed for conversation {}: {}", conversation_id, e);
                let apology = format!("I apologize, but I encountered an error: {}", e);
                self.record_turn(conversation_id, question, &apology).await?;
                return Err(e);
            }
        };

        let parsed = parse_chat_response(&raw);
        self.record_turn(conversation_id, question, &parsed.answer)
            .await?;

        Ok(ChatResult {
            answer: parsed.answer,
            reasoning: parsed.reasoning,
            source_ids: parsed.source_ids,
            source_documents: source_documents(&retrieved),
            raw_response: raw,
            conversation_id: conversation_id.to_string(),
            detected_language: language,
        })
    }

    async fn record_turn(&self, conversation_id: &str, question: &str, reply: &str) -> AppResult<()> {
        let manager = Arc::clone(&self.history);
        let id = conversation_id.to_string();
        let question = question.to_string();
        let reply = reply.to_string();
        blocking(move || {
            manager.append_user(&id, &question)?;
            manager.append_assistant(&id, &reply)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_sections() {
        let parsed = parse_chat_response(
            "RESPONSE:\nCats are mammals.\n\nREASONING: Source 1 says so.\nSOURCES: 1, 3",
        );
        assert_eq!(parsed.answer, "Cats are mammals.");
        assert_eq!(parsed.reasoning, "Source 1 says so.");
        assert_eq!(parsed.source_ids, vec![1, 3]);
    }

    #[test]
    fn test_parse_without_headers() {
        let parsed = parse_chat_response("Just an answer.\n\nWith two lines.");
        assert_eq!(parsed.answer, "Just an answer.\nWith two lines.");
        assert!(parsed.reasoning.is_empty());
        assert!(parsed.source_ids.is_empty());

        assert_eq!(parse_chat_response(""), ParsedChat::default());
    }

    #[test]
    fn test_parse_case_insensitive_and_markdown() {
        let parsed = parse_chat_response("**Response:** yes\nreasoning: because\n## Sources: [2]");
        assert_eq!(parsed.answer, "yes");
        assert_eq!(parsed.reasoning, "because");
        assert_eq!(parsed.source_ids, vec![2]);
    }

    #[test]
    fn test_parse_strips_think_and_missing_sections() {
        let parsed = parse_chat_response(
            "<think>RESPONSE: not this\nSOURCES: 9</think>\nRESPONSE: the real answer",
        );
        assert_eq!(parsed.answer, "the real answer");
        assert!(parsed.reasoning.is_empty());
        assert!(parsed.source_ids.is_empty());
    }

    #[test]
    fn test_parse_multiline_arabic_response() {
        let parsed = parse_chat_response("RESPONSE:\nنعم\nالقطط ثدييات\nSOURCES: المصدر 1");
        assert_eq!(parsed.answer, "نعم\nالقطط ثدييات");
        assert_eq!(parsed.source_ids, vec![1]);
    }
}
