//! Source document loading.
//!
//! Plain text and Markdown files load as a single page. JSON files carry
//! page-structured text extracted upstream, either `{"pages": [...]}` or a bare
//! list, where each entry has `text` and optionally `page` (or `page_number`).

use crate::types::{Document, DocumentPage};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sift_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions picked up when walking directories.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "json"];

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(alias = "page_number")]
    page: Option<u32>,
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPages {
    Wrapped { pages: Vec<RawPage> },
    List(Vec<RawPage>),
}

/// Stable id for a document: the first 16 hex chars of SHA-256 of its path.
pub fn source_id_for(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// Normalize whitespace while keeping paragraph structure.
///
/// Runs of three or more newlines become a blank line, runs of other
/// whitespace become one space, and lines are trimmed.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_newlines = 0usize;
    let mut pending_space = false;

    for ch in text.chars() {
        if ch == '\n' {
            pending_newlines += 1;
            pending_space = false;
        } else if ch.is_whitespace() {
            pending_space = true;
        } else {
            if !out.is_empty() {
                if pending_newlines > 0 {
                    out.push_str(if pending_newlines >= 2 { "\n\n" } else { "\n" });
                } else if pending_space {
                    out.push(' ');
                }
            }
            pending_newlines = 0;
            pending_space = false;
            out.push(ch);
        }
    }

    out
}

/// Load one file into a [`Document`]. Empty pages are dropped.
pub fn load_document(path: &Path) -> AppResult<Document> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let pages: Vec<DocumentPage> = match extension.as_deref() {
        Some("json") => {
            let raw: RawPages = serde_json::from_str(&contents).map_err(|e| {
                AppError::Knowledge(format!("Unsupported JSON layout in {:?}: {}", path, e))
            })?;
            let raw = match raw {
                RawPages::Wrapped { pages } => pages,
                RawPages::List(pages) => pages,
            };
            raw.into_iter()
                .enumerate()
                .map(|(i, p)| DocumentPage {
                    page: p.page.unwrap_or(i as u32 + 1),
                    text: clean_text(&p.text),
                })
                .filter(|p| !p.text.is_empty())
                .collect()
        }
        _ => {
            let text = clean_text(&contents);
            if text.is_empty() {
                Vec::new()
            } else {
                vec![DocumentPage { page: 1, text }]
            }
        }
    };

    tracing::debug!("Loaded {:?} ({} pages)", path, pages.len());

    Ok(Document {
        source_id: source_id_for(path),
        path: path.to_path_buf(),
        pages,
    })
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load every supported file under `paths`, in sorted path order.
///
/// Explicit file arguments are loaded regardless of extension; directories
/// are walked for supported extensions only.
pub fn collect_documents(paths: &[PathBuf]) -> AppResult<Vec<Document>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file() && is_supported(entry_path) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            return Err(AppError::Knowledge(format!("Path not found: {:?}", path)));
        }
    }

    files.sort();
    files.dedup();

    files.iter().map(|f| load_document(f)).collect()
}
