//! Knowledge base configuration management.
//!
//! Each base keeps its settings in `.sift/knowledge/<base>/config.yaml`. The
//! embedding dimension recorded there must match the index on disk, so the
//! file is written once when a base is first indexed and read thereafter.

use crate::embeddings::EmbeddingConfig;
use crate::rerank::RerankConfig;
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    pub name: String,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub rerank: RerankConfig,
}

/// Chunk sizing, in whitespace-delimited tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    200
}

fn default_chunk_overlap() -> usize {
    50
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Which vector index implementation backs a base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// In-memory exact index, saved to `flat/`
    #[default]
    Flat,
    /// SQLite table with a vector-similarity SQL function
    Sqlite,
}

impl IndexBackend {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(AppError::Config(format!(
                "Unknown index backend '{}'. Supported: flat, sqlite",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,
}

impl KnowledgeBaseConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            rerank: RerankConfig::default(),
        }
    }
}

/// Load knowledge base configuration.
///
/// Loads from `.sift/knowledge/<base>/config.yaml` if it exists, otherwise
/// returns defaults named after the base.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    let config_path = get_config_path(workspace, base_name);

    if !config_path.exists() {
        tracing::debug!(
            "Using default knowledge base config for '{}' (no config file found)",
            base_name
        );
        return Ok(KnowledgeBaseConfig::new(base_name));
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Knowledge(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    config.name = base_name.to_string();

    tracing::debug!("Loaded knowledge base config for '{}'", base_name);
    Ok(config)
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Knowledge(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Knowledge(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

/// Get the base directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace.join(".sift").join("knowledge").join(base_name)
}

/// Get the path to a base's config file.
pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

/// Directory holding a saved flat index.
pub fn get_flat_index_dir(base_dir: &Path) -> PathBuf {
    base_dir.join("flat")
}

/// SQLite database file for the persisted index.
pub fn get_sqlite_path(base_dir: &Path) -> PathBuf {
    base_dir.join("index.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), "docs").unwrap();

        assert_eq!(config.name, "docs");
        assert_eq!(config.chunking.chunk_size, 200);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.index.backend, IndexBackend::Flat);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();

        let mut config = KnowledgeBaseConfig::new("docs");
        config.chunking.chunk_size = 120;
        config.index.backend = IndexBackend::Sqlite;
        config.rerank.enabled = true;

        save_config(temp.path(), &config).unwrap();
        let loaded = load_config(temp.path(), "docs").unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path(), "docs");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "name: docs\nindex:\n  backend: sqlite\n").unwrap();

        let loaded = load_config(temp.path(), "docs").unwrap();
        assert_eq!(loaded.index.backend, IndexBackend::Sqlite);
        assert_eq!(loaded.chunking, ChunkingConfig::default());
    }

    #[test]
    fn test_paths() {
        let workspace = Path::new("/ws");
        let base = get_base_dir(workspace, "docs");
        assert_eq!(base, PathBuf::from("/ws/.sift/knowledge/docs"));
        assert!(get_sqlite_path(&base).ends_with("index.sqlite"));
        assert!(get_flat_index_dir(&base).ends_with("flat"));
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(IndexBackend::parse("SQLite").unwrap(), IndexBackend::Sqlite);
        assert!(IndexBackend::parse("faiss").is_err());
    }
}
