//! Prompt system for sift.
//!
//! - A YAML prompt catalog (built in, overridable per workspace)
//! - Handlebars template rendering
//! - Response-language instruction injection

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_prompt, language_instruction, render_template};
pub use loader::{list_prompt_files, load_catalog};
pub use types::{PartialCatalog, PromptCatalog, Verbosity, VerbosityTemplates};
