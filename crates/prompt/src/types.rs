//! Prompt catalog types.

use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::fmt;

/// Templates keyed by verbosity (`base`, `with_reasoning`).
pub type VerbosityTemplates = BTreeMap<String, String>;

/// Every prompt template sift renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptCatalog {
    /// Conversational answer with RESPONSE/REASONING/SOURCES sections
    pub chat: String,

    /// Question/answer pair generation
    pub questions: String,

    /// Keyword-seeded five-part summary
    pub keyword_summary: String,

    /// Flat summaries, keyed by length then verbosity
    #[serde(default)]
    pub summary_templates: BTreeMap<String, VerbosityTemplates>,

    /// Multi-level overviews, keyed by level, then length, then verbosity
    #[serde(default)]
    pub overview_templates: BTreeMap<String, BTreeMap<String, VerbosityTemplates>>,
}

/// A catalog file where every entry is optional; used for workspace overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialCatalog {
    pub chat: Option<String>,
    pub questions: Option<String>,
    pub keyword_summary: Option<String>,
    #[serde(default)]
    pub summary_templates: BTreeMap<String, VerbosityTemplates>,
    #[serde(default)]
    pub overview_templates: BTreeMap<String, BTreeMap<String, VerbosityTemplates>>,
}

/// Whether a summary should also explain itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Base,
    WithReasoning,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::WithReasoning
        } else {
            Self::Base
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::WithReasoning => "with_reasoning",
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PromptCatalog {
    /// Overlay the entries present in `overrides` onto this catalog.
    pub fn merge(&mut self, overrides: PartialCatalog) {
        if let Some(chat) = overrides.chat {
            self.chat = chat;
        }
        if let Some(questions) = overrides.questions {
            self.questions = questions;
        }
        if let Some(keyword_summary) = overrides.keyword_summary {
            self.keyword_summary = keyword_summary;
        }
        for (length, variants) in overrides.summary_templates {
            self.summary_templates
                .entry(length)
                .or_default()
                .extend(variants);
        }
        for (level, lengths) in overrides.overview_templates {
            let target = self.overview_templates.entry(level).or_default();
            for (length, variants) in lengths {
                target.entry(length).or_default().extend(variants);
            }
        }
    }

    /// Look up a flat summary template.
    ///
    /// # Errors
    /// `AppError::MissingTemplate` naming the full key when any level is absent.
    pub fn summary_template(&self, length: &str, verbosity: Verbosity) -> AppResult<&str> {
        self.summary_templates
            .get(length)
            .and_then(|variants| variants.get(verbosity.as_str()))
            .map(String::as_str)
            .ok_or_else(|| {
                AppError::MissingTemplate(format!("summary_templates.{}.{}", length, verbosity))
            })
    }

    /// Look up an overview template.
    pub fn overview_template(
        &self,
        level: &str,
        length: &str,
        verbosity: Verbosity,
    ) -> AppResult<&str> {
        self.overview_templates
            .get(level)
            .and_then(|lengths| lengths.get(length))
            .and_then(|variants| variants.get(verbosity.as_str()))
            .map(String::as_str)
            .ok_or_else(|| {
                AppError::MissingTemplate(format!(
                    "overview_templates.{}.{}.{}",
                    level, length, verbosity
                ))
            })
    }

    /// Summary lengths the catalog defines.
    pub fn summary_lengths(&self) -> Vec<&str> {
        self.summary_templates.keys().map(String::as_str).collect()
    }

    /// Overview levels the catalog defines.
    pub fn overview_levels(&self) -> Vec<&str> {
        self.overview_templates.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PromptCatalog {
        serde_yaml::from_str(
            r#"
chat: "c"
questions: "q"
keyword_summary: "k"
summary_templates:
  short:
    base: "short base"
overview_templates:
  executive:
    long:
      with_reasoning: "exec long reasoning"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_summary_lookup() {
        let catalog = catalog();
        assert_eq!(
            catalog.summary_template("short", Verbosity::Base).unwrap(),
            "short base"
        );
    }

    #[test]
    fn test_missing_summary_key_names_the_path() {
        let catalog = catalog();
        match catalog.summary_template("short", Verbosity::WithReasoning) {
            Err(AppError::MissingTemplate(key)) => {
                assert_eq!(key, "summary_templates.short.with_reasoning")
            }
            other => panic!("expected MissingTemplate, got {:?}", other),
        }
        assert!(catalog.summary_template("epic", Verbosity::Base).is_err());
    }

    #[test]
    fn test_overview_lookup() {
        let catalog = catalog();
        assert!(catalog
            .overview_template("executive", "long", Verbosity::WithReasoning)
            .is_ok());
        assert!(matches!(
            catalog.overview_template("executive", "short", Verbosity::Base),
            Err(AppError::MissingTemplate(_))
        ));
    }

    #[test]
    fn test_merge_overrides_single_entry() {
        let mut catalog = catalog();
        let overrides: PartialCatalog = serde_yaml::from_str(
            r#"
chat: "custom chat"
summary_templates:
  short:
    with_reasoning: "short reasoning"
"#,
        )
        .unwrap();

        catalog.merge(overrides);
        assert_eq!(catalog.chat, "custom chat");
        assert_eq!(catalog.questions, "q");
        assert_eq!(
            catalog.summary_template("short", Verbosity::Base).unwrap(),
            "short base"
        );
        assert_eq!(
            catalog
                .summary_template("short", Verbosity::WithReasoning)
                .unwrap(),
            "short reasoning"
        );
    }
}
