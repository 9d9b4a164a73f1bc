//! Prompt catalog loading.
//!
//! The built-in catalog is compiled into the binary. A workspace can override
//! any entry by dropping YAML files into `.sift/prompts/`; files are applied in
//! name order, later files winning.

use crate::types::{PartialCatalog, PromptCatalog};
use sift_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

const BUILTIN_CATALOG: &str = include_str!("../prompts/default.yaml");

impl PromptCatalog {
    /// The catalog shipped with sift.
    pub fn builtin() -> AppResult<Self> {
        serde_yaml::from_str(BUILTIN_CATALOG)
            .map_err(|e| AppError::Prompt(format!("Built-in prompt catalog is invalid: {}", e)))
    }
}

/// Load the built-in catalog with workspace overrides applied.
///
/// # Arguments
/// * `workspace_path` - Root workspace directory containing `.sift/`
pub fn load_catalog(workspace_path: &Path) -> AppResult<PromptCatalog> {
    let mut catalog = PromptCatalog::builtin()?;

    for file in list_prompt_files(workspace_path)? {
        tracing::debug!("Applying prompt overrides from {:?}", file);

        let contents = std::fs::read_to_string(&file).map_err(|e| {
            AppError::Prompt(format!("Failed to read prompt file {:?}: {}", file, e))
        })?;

        let overrides: PartialCatalog = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", file, e))
        })?;

        catalog.merge(overrides);
    }

    Ok(catalog)
}

/// List override files in `.sift/prompts/`, sorted by name.
pub fn list_prompt_files(workspace_path: &Path) -> AppResult<Vec<PathBuf>> {
    let prompts_dir = workspace_path.join(".sift/prompts");

    if !prompts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&prompts_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|s| s.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Verbosity;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_catalog_is_complete() {
        let catalog = PromptCatalog::builtin().unwrap();

        for length in ["short", "medium", "long"] {
            for verbosity in [Verbosity::Base, Verbosity::WithReasoning] {
                assert!(catalog.summary_template(length, verbosity).is_ok());
                for level in ["executive", "detailed"] {
                    assert!(catalog.overview_template(level, length, verbosity).is_ok());
                }
            }
        }
        assert!(catalog.chat.contains("RESPONSE:"));
        assert!(catalog.keyword_summary.contains("Conclusion"));
    }

    #[test]
    fn test_load_catalog_without_overrides() {
        let temp = TempDir::new().unwrap();
        let catalog = load_catalog(temp.path()).unwrap();
        assert_eq!(catalog, PromptCatalog::builtin().unwrap());
    }

    #[test]
    fn test_load_catalog_applies_overrides_in_order() {
        let temp = TempDir::new().unwrap();
        let prompts = temp.path().join(".sift/prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        std::fs::write(prompts.join("10-chat.yaml"), "chat: first").unwrap();
        std::fs::write(prompts.join("20-chat.yml"), "chat: second").unwrap();
        std::fs::write(prompts.join("notes.txt"), "chat: ignored").unwrap();

        let catalog = load_catalog(temp.path()).unwrap();
        assert_eq!(catalog.chat, "second");
        assert_eq!(list_prompt_files(temp.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_override_is_reported() {
        let temp = TempDir::new().unwrap();
        let prompts = temp.path().join(".sift/prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        std::fs::write(prompts.join("bad.yaml"), "chat: [unclosed").unwrap();

        assert!(matches!(load_catalog(temp.path()), Err(AppError::Prompt(_))));
    }
}
