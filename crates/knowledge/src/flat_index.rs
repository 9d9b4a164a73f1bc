//! In-memory exact vector index.
//!
//! Search is a linear scan under a read lock. `build` and `append` change the
//! contents under the write lock, so concurrent searches see either the old or
//! the new set, never a mix, and concurrent appends never drop a batch. Saves
//! are serialized so two writers never share the temporary files.
//!
//! On disk an index is a directory with `manifest.json` (chunks and settings)
//! and `vectors.bin` (row-major little-endian f32).

use crate::config::IndexBackend;
use crate::types::{Chunk, EmbeddedChunk, RetrievedCandidate};
use crate::vector_index::{
    bytes_to_embedding, check_dimension, dot, embedding_to_bytes, normalize, rank, VectorIndex,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    dimensions: usize,
    normalize: bool,
    chunks: Vec<Chunk>,
}

/// Exact inner-product index held in memory.
#[derive(Debug)]
pub struct FlatIndex {
    dimensions: usize,
    normalize: bool,
    /// Directory used by `persist`, if any
    home: Option<PathBuf>,
    entries: RwLock<Vec<EmbeddedChunk>>,
    save_lock: Mutex<()>,
}

impl FlatIndex {
    /// Empty index with no save location.
    pub fn new(dimensions: usize, normalize: bool) -> Self {
        Self {
            dimensions,
            normalize,
            home: None,
            entries: RwLock::new(Vec::new()),
            save_lock: Mutex::new(()),
        }
    }

    /// Load from `dir` if it holds a saved index, otherwise start empty.
    /// Either way `persist` writes back to `dir`.
    pub fn open(dir: &Path, dimensions: usize, normalize: bool) -> AppResult<Self> {
        let mut index = if dir.join(MANIFEST_FILE).exists() {
            let loaded = Self::load(dir)?;
            if loaded.dimensions != dimensions {
                return Err(AppError::DimensionMismatch {
                    expected: dimensions,
                    actual: loaded.dimensions,
                });
            }
            if loaded.normalize != normalize {
                return Err(AppError::Config(format!(
                    "Flat index at {:?} was built with normalize = {}, but the base is configured with normalize = {}; rebuild the index",
                    dir, loaded.normalize, normalize
                )));
            }
            loaded
        } else {
            Self::new(dimensions, normalize)
        };
        index.home = Some(dir.to_path_buf());
        Ok(index)
    }

    /// Write the index to `dir`, replacing any previous save.
    pub fn save(&self, dir: &Path) -> AppResult<()> {
        let _saving = self.save_lock.lock();
        fs::create_dir_all(dir)?;

        let entries = self.entries.read();
        let mut vectors = Vec::with_capacity(entries.len() * self.dimensions * 4);
        for entry in entries.iter() {
            vectors.extend_from_slice(&embedding_to_bytes(&entry.vector));
        }

        let manifest = Manifest {
            version: FORMAT_VERSION,
            dimensions: self.dimensions,
            normalize: self.normalize,
            chunks: entries.iter().map(|e| e.chunk.clone()).collect(),
        };
        drop(entries);

        // Vectors first: a manifest only ever points at a complete vector file.
        write_atomic(&dir.join(VECTORS_FILE), &vectors)?;
        write_atomic(
            &dir.join(MANIFEST_FILE),
            serde_json::to_string(&manifest)?.as_bytes(),
        )?;

        tracing::debug!("Saved flat index ({} chunks) to {:?}", manifest.chunks.len(), dir);
        Ok(())
    }

    /// Load an index saved by [`save`](Self::save).
    pub fn load(dir: &Path) -> AppResult<Self> {
        let manifest: Manifest = serde_json::from_str(&fs::read_to_string(dir.join(MANIFEST_FILE))?)?;
        if manifest.version != FORMAT_VERSION {
            return Err(AppError::Datastore(format!(
                "Unsupported flat index version {} in {:?}",
                manifest.version, dir
            )));
        }

        let vectors = bytes_to_embedding(&fs::read(dir.join(VECTORS_FILE))?)?;
        let expected = manifest.chunks.len() * manifest.dimensions;
        if vectors.len() != expected {
            return Err(AppError::Datastore(format!(
                "Flat index at {:?} is corrupt: expected {} floats, found {}",
                dir,
                expected,
                vectors.len()
            )));
        }

        let entries: Vec<EmbeddedChunk> = if manifest.dimensions == 0 {
            Vec::new()
        } else {
            manifest
                .chunks
                .into_iter()
                .zip(vectors.chunks_exact(manifest.dimensions))
                .map(|(chunk, v)| EmbeddedChunk::new(chunk, v.to_vec()))
                .collect()
        };

        tracing::debug!("Loaded flat index ({} chunks) from {:?}", entries.len(), dir);

        Ok(Self {
            dimensions: manifest.dimensions,
            normalize: manifest.normalize,
            home: None,
            entries: RwLock::new(entries),
            save_lock: Mutex::new(()),
        })
    }
}

impl FlatIndex {
    /// Validate every vector before any is stored, so a bad batch changes nothing.
    fn prepare(&self, mut chunks: Vec<EmbeddedChunk>) -> AppResult<Vec<EmbeddedChunk>> {
        for chunk in &mut chunks {
            check_dimension(self.dimensions, &chunk.vector)?;
            if self.normalize {
                normalize(&mut chunk.vector);
            }
        }
        Ok(chunks)
    }
}

impl VectorIndex for FlatIndex {
    fn backend(&self) -> IndexBackend {
        IndexBackend::Flat
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn build(&self, chunks: Vec<EmbeddedChunk>) -> AppResult<()> {
        let chunks = self.prepare(chunks)?;
        let count = chunks.len();
        *self.entries.write() = chunks;

        tracing::info!("Built flat index with {} chunks", count);
        Ok(())
    }

    fn append(&self, chunks: Vec<EmbeddedChunk>) -> AppResult<()> {
        let chunks = self.prepare(chunks)?;
        let added = chunks.len();
        let total = {
            let mut entries = self.entries.write();
            entries.extend(chunks);
            entries.len()
        };

        tracing::info!("Appended {} chunks to flat index ({} total)", added, total);
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<RetrievedCandidate>> {
        check_dimension(self.dimensions, query)?;

        let mut query = query.to_vec();
        if self.normalize {
            normalize(&mut query);
        }

        let entries = self.entries.read();
        let mut scores: Vec<(u64, f32)> = entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (id as u64, dot(&query, &entry.vector)))
            .collect();
        rank(&mut scores, top_k);

        Ok(scores
            .into_iter()
            .map(|(id, similarity)| RetrievedCandidate {
                id,
                chunk: entries[id as usize].clone(),
                similarity,
            })
            .collect())
    }

    fn len(&self) -> AppResult<usize> {
        Ok(self.entries.read().len())
    }

    fn chunks(&self) -> AppResult<Vec<EmbeddedChunk>> {
        Ok(self.entries.read().clone())
    }

    fn reset(&self) -> AppResult<()> {
        self.entries.write().clear();
        if let Some(home) = &self.home {
            if home.exists() {
                fs::remove_dir_all(home)?;
            }
        }
        tracing::info!("Reset flat index");
        Ok(())
    }

    fn persist(&self) -> AppResult<()> {
        match &self.home {
            Some(home) => self.save(home),
            None => Ok(()),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
