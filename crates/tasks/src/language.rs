//! Response-language detection.

use sift_core::RagSettings;
use whatlang::Script;

/// Maps input text to the English name of the language to answer in.
///
/// Short questions rarely give a statistically reliable guess, so any
/// supported guess is accepted. When the guess is unsupported, a script used
/// by a single language (Arabic, Greek, Hangul...) decides instead. The default
/// language is used for empty text, undetectable text, and unsupported
/// languages. Never fails.
#[derive(Debug, Clone)]
pub struct LanguageDetector {
    default: String,
    supported: Vec<String>,
}

impl LanguageDetector {
    pub fn new(default: impl Into<String>, supported: Vec<String>) -> Self {
        Self {
            default: default.into(),
            supported,
        }
    }

    pub fn from_settings(settings: &RagSettings) -> Self {
        Self::new(
            settings.default_language.clone(),
            settings.supported_languages.clone(),
        )
    }

    pub fn default_language(&self) -> &str {
        &self.default
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.supported
            .iter()
            .any(|s| s.eq_ignore_ascii_case(language))
    }

    pub fn detect(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return self.default.clone();
        }

        let Some(info) = whatlang::detect(text) else {
            return self.default.clone();
        };

        let name = info.lang().eng_name();
        if self.is_supported(name) {
            if !info.is_reliable() {
                tracing::debug!(
                    "Accepting low-confidence detection {} ({:.2})",
                    name,
                    info.confidence()
                );
            }
            return name.to_string();
        }

        if let Some(language) = script_language(info.script()).filter(|l| self.is_supported(l)) {
            tracing::debug!("Detected {} but the script is {}", name, language);
            return language.to_string();
        }

        tracing::debug!(
            "Detected unsupported language {}, using {}",
            name,
            self.default
        );
        self.default.clone()
    }
}

/// Language for scripts that, in practice, only one supported language uses.
fn script_language(script: Script) -> Option<&'static str> {
    match script {
        Script::Arabic => Some("Arabic"),
        Script::Greek => Some("Greek"),
        Script::Hebrew => Some("Hebrew"),
        Script::Hangul => Some("Korean"),
        Script::Hiragana | Script::Katakana => Some("Japanese"),
        Script::Thai => Some("Thai"),
        Script::Georgian => Some("Georgian"),
        _ => None,
    }
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::from_settings(&RagSettings::default())
    }
}
