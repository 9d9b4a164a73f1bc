//! Templated document summarization.

use crate::generator::Generator;
use crate::language::LanguageDetector;
use serde::Serialize;
use sift_core::{AppError, AppResult};
use sift_prompt::{build_prompt, PromptCatalog, Verbosity};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    pub text: String,
    pub length: String,
    pub verbose: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_level: Option<String>,
    pub detected_language: String,
}

#[derive(Debug)]
pub struct SummarizationStrategy {
    generator: Generator,
    detector: LanguageDetector,
    catalog: Arc<PromptCatalog>,
}

impl SummarizationStrategy {
    pub fn new(generator: Generator, detector: LanguageDetector, catalog: Arc<PromptCatalog>) -> Self {
        Self {
            generator,
            detector,
            catalog,
        }
    }

    /// Summarize `text` with the template for `length`/`verbose`, or for
    /// `overview_level` when given.
    ///
    /// # Errors
    /// `AppError::MissingTemplate` if the catalog has no such template; the
    /// generator is not called in that case.
    pub async fn run(
        &self,
        text: &str,
        length: &str,
        verbose: bool,
        overview_level: Option<&str>,
    ) -> AppResult<SummaryResult> {
        let verbosity = Verbosity::from_verbose(verbose);
        let template = match overview_level {
            Some(level) => self.catalog.overview_template(level, length, verbosity)?,
            None => self.catalog.summary_template(length, verbosity)?,
        };

        if text.trim().is_empty() {
            return Err(AppError::Task("Cannot summarize an empty document".to_string()));
        }

        let language = self.detector.detect(text);
        tracing::info!(
            "Summarizing {} chars (length={}, verbosity={}, overview={:?}, language={})",
            text.chars().count(),
            length,
            verbosity,
            overview_level,
            language
        );

        let mut variables = HashMap::new();
        variables.insert("context".to_string(), text.to_string());
        let prompt = build_prompt(template, &language, variables)?;

        let summary = self.generator.generate(&prompt).await?;

        Ok(SummaryResult {
            text: summary.trim().to_string(),
            length: length.to_string(),
            verbose,
            overview_level: overview_level.map(str::to_string),
            detected_language: language,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_llm::StaticClient;

    fn strategy(client: Arc<StaticClient>) -> SummarizationStrategy {
        SummarizationStrategy::new(
            Generator::new(client, "static"),
            LanguageDetector::default(),
            Arc::new(PromptCatalog::builtin().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_summary_uses_selected_template() {
        let client = Arc::new(StaticClient::new("  Cats are mammals.  "));
        let result = strategy(client.clone())
            .run("Cats are mammals. Dogs are mammals too.", "short", false, None)
            .await
            .unwrap();

        assert_eq!(result.text, "Cats are mammals.");
        assert_eq!(result.detected_language, "English");

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("IMPORTANT: You must respond entirely in English."));
        assert!(prompts[0].contains("2-3 sentences"));
        assert!(prompts[0].contains("Dogs are mammals too."));
    }

    #[tokio::test]
    async fn test_overview_level_template() {
        let client = Arc::new(StaticClient::new("overview"));
        let result = strategy(client.clone())
            .run("Some text", "long", true, Some("executive"))
            .await
            .unwrap();
        assert_eq!(result.overview_level.as_deref(), Some("executive"));
        assert!(result.verbose);
    }

    #[tokio::test]
    async fn test_missing_template_skips_generator() {
        let client = Arc::new(StaticClient::new("unused"));
        let strategy = strategy(client.clone());

        let result = strategy.run("Some text", "epic", false, None).await;
        assert!(matches!(result, Err(AppError::MissingTemplate(_))));

        let result = strategy
            .run("Some text", "short", false, Some("galactic"))
            .await;
        assert!(matches!(result, Err(AppError::MissingTemplate(_))));

        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_is_task_error() {
        let client = Arc::new(StaticClient::new("unused"));
        let result = strategy(client.clone()).run("  \n", "short", false, None).await;
        assert!(matches!(result, Err(AppError::Task(_))));
        assert!(client.prompts().is_empty());
    }
}
