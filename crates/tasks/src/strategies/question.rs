//! Study question generation from a single chunk.

use super::strip_tags;
use crate::generator::Generator;
use crate::language::LanguageDetector;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};
use sift_knowledge::Chunk;
use sift_prompt::{build_prompt, PromptCatalog};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use strsim::normalized_levenshtein;

static QUESTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Q(\d+):\s*(.+)$").expect("valid regex"));

static ANSWER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^A(\d+):\s*(.+)$").expect("valid regex"));

/// Minimum normalized similarity for a fuzzy complexity match.
const COMPLEXITY_CUTOFF: f64 = 0.6;

const SYNONYMS: [(&str, Complexity); 9] = [
    ("challenging", Complexity::Hard),
    ("difficult", Complexity::Hard),
    ("tough", Complexity::Hard),
    ("simple", Complexity::Easy),
    ("basic", Complexity::Easy),
    ("beginner", Complexity::Easy),
    ("moderate", Complexity::Medium),
    ("average", Complexity::Medium),
    ("normal", Complexity::Medium),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [Self::Easy, Self::Medium, Self::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// Guidance given to the model for this level.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Easy => {
                "Generate simple, basic questions that test understanding of key facts and definitions."
            }
            Self::Medium => {
                "Generate moderately challenging questions that require analysis and understanding of concepts."
            }
            Self::Hard => {
                "Generate complex questions that require critical thinking, analysis, and synthesis of information."
            }
        }
    }

    /// Resolve a user-supplied level: exact name, then synonym, then the
    /// closest name or synonym with similarity of at least 0.6.
    pub fn resolve(input: &str) -> AppResult<Self> {
        let wanted = input.trim().to_lowercase();

        if let Some(level) = Self::ALL.iter().find(|c| c.as_str() == wanted) {
            return Ok(*level);
        }
        if let Some((_, level)) = SYNONYMS.iter().find(|(name, _)| *name == wanted) {
            return Ok(*level);
        }

        let candidates = Self::ALL
            .iter()
            .map(|c| (c.as_str(), *c))
            .chain(SYNONYMS.iter().copied());

        let mut best: Option<(f64, &str, Complexity)> = None;
        for (name, level) in candidates {
            let score = normalized_levenshtein(&wanted, name);
            if score >= COMPLEXITY_CUTOFF && best.map_or(true, |(b, _, _)| score > b) {
                best = Some((score, name, level));
            }
        }

        match best {
            Some((score, name, level)) => {
                tracing::debug!(
                    "Complexity '{}' fuzzily matched '{}' ({:.2})",
                    input,
                    name,
                    score
                );
                Ok(level)
            }
            None => Err(AppError::UnknownComplexity(input.to_string())),
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionsResult {
    pub source_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub raw_output: String,
    pub pairs: Vec<QaPair>,
    pub complexity: Complexity,
    pub detected_language: String,
}

/// Extract `Qn:` / `An:` pairs. An answer must sit on the next non-blank line
/// and carry the same number; anything else is skipped.
pub fn parse_qa_pairs(raw: &str) -> Vec<QaPair> {
    let cleaned = strip_tags(raw);
    let lines: Vec<&str> = cleaned
        .lines()
        .map(|l| l.trim().trim_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut pairs = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(question) = QUESTION_LINE.captures(lines[i]) else {
            i += 1;
            continue;
        };

        let answer = lines
            .get(i + 1)
            .and_then(|next| ANSWER_LINE.captures(next))
            .filter(|a| a[1] == question[1]);

        match answer {
            Some(answer) => {
                pairs.push(QaPair {
                    question: question[2].trim().to_string(),
                    answer: answer[2].trim().to_string(),
                });
                i += 2;
            }
            None => {
                tracing::debug!("Dropping unanswered question: {}", lines[i]);
                i += 1;
            }
        }
    }
    pairs
}

#[derive(Debug)]
pub struct QuestionStrategy {
    generator: Generator,
    detector: LanguageDetector,
    catalog: Arc<PromptCatalog>,
    complexity: Complexity,
}

impl QuestionStrategy {
    pub fn new(generator: Generator, detector: LanguageDetector, catalog: Arc<PromptCatalog>) -> Self {
        Self {
            generator,
            detector,
            catalog,
            complexity: Complexity::default(),
        }
    }

    pub fn complexity(&self) -> Complexity {
        self.complexity
    }

    /// Change the complexity level; see [`Complexity::resolve`].
    pub fn set_complexity(&mut self, input: &str) -> AppResult<Complexity> {
        let level = Complexity::resolve(input)?;
        if level != self.complexity {
            tracing::info!("Question complexity changed: {} -> {}", self.complexity, level);
        }
        self.complexity = level;
        Ok(level)
    }

    /// Generate `count` question/answer pairs from a chunk, at `complexity`
    /// when given and at the strategy's configured level otherwise.
    pub async fn run(
        &self,
        chunk: &Chunk,
        count: usize,
        complexity: Option<Complexity>,
    ) -> AppResult<QuestionsResult> {
        if count == 0 {
            return Err(AppError::Task("Question count must be at least 1".to_string()));
        }
        if chunk.text.trim().is_empty() {
            return Err(AppError::Task(
                "Cannot generate questions from an empty chunk".to_string(),
            ));
        }

        let complexity = complexity.unwrap_or(self.complexity);
        let language = self.detector.detect(&chunk.text);

        let mut variables = HashMap::new();
        variables.insert("context".to_string(), chunk.text.clone());
        variables.insert("count".to_string(), count.to_string());
        variables.insert(
            "instruction".to_string(),
            complexity.instruction().to_string(),
        );
        let prompt = build_prompt(&self.catalog.questions, &language, variables)?;

        let raw = self.generator.generate(&prompt).await?;
        let pairs = parse_qa_pairs(&raw);

        if pairs.len() < count {
            tracing::warn!(
                "Requested {} questions for chunk {}#{}, parsed {}",
                count,
                chunk.source_id,
                chunk.chunk_index,
                pairs.len()
            );
        }

        Ok(QuestionsResult {
            source_id: chunk.source_id.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
            raw_output: raw,
            pairs,
            complexity,
            detected_language: language,
        })
    }
}
