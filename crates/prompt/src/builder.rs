//! Prompt rendering.

use handlebars::Handlebars;
use sift_core::{AppError, AppResult};
use std::collections::HashMap;

/// Instruction prepended to every prompt so the answer matches the input language.
pub fn language_instruction(language: &str) -> String {
    format!(
        "IMPORTANT: You must respond entirely in {lang}. All content, headers, and explanations must be in {lang} language only.\n\n",
        lang = language
    )
}

/// Render a template and prefix it with the language instruction.
///
/// `language` is also exposed to the template as `{{language}}`.
///
/// # Example
/// ```
/// use sift_prompt::build_prompt;
/// use std::collections::HashMap;
///
/// let mut vars = HashMap::new();
/// vars.insert("context".to_string(), "Rust is fast.".to_string());
///
/// let prompt = build_prompt("Summarize: {{context}}", "English", vars).unwrap();
/// assert!(prompt.ends_with("Summarize: Rust is fast."));
/// ```
pub fn build_prompt(
    template: &str,
    language: &str,
    mut variables: HashMap<String, String>,
) -> AppResult<String> {
    variables.insert("language".to_string(), language.to_string());
    let rendered = render_template(template, &variables)?;
    Ok(format!("{}{}", language_instruction(language), rendered))
}

/// Render a Handlebars template with variables.
///
/// Strict mode is on: a template referencing a variable that was not supplied
/// is an error rather than an empty substitution.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text; HTML escaping would mangle quotes and ampersands.
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_does_not_escape() {
        let rendered =
            render_template("Q: {{question}}", &vars(&[("question", "a < b & \"c\"")])).unwrap();
        assert_eq!(rendered, "Q: a < b & \"c\"");
    }

    #[test]
    fn test_render_missing_variable_fails() {
        let result = render_template("Hello {{name}}", &HashMap::new());
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_build_prompt_prepends_language() {
        let prompt = build_prompt("Answer in {{language}}.", "Arabic", HashMap::new()).unwrap();
        assert!(prompt.starts_with("IMPORTANT: You must respond entirely in Arabic."));
        assert!(prompt.ends_with("Answer in Arabic."));
    }

    #[test]
    fn test_empty_history_section_is_omitted() {
        let template = "{{#if history}}History:\n{{history}}\n{{/if}}Q: {{question}}";
        let without = render_template(template, &vars(&[("history", ""), ("question", "x")]))
            .unwrap();
        assert_eq!(without, "Q: x");

        let with = render_template(
            template,
            &vars(&[("history", "Human: hi"), ("question", "x")]),
        )
        .unwrap();
        assert!(with.starts_with("History:\nHuman: hi"));
    }
}
