//! SQLite-backed vector index.
//!
//! Rows live in a `chunks` table with the embedding stored as a little-endian
//! f32 BLOB. Ranking happens in SQL through the `vec_dot` scalar function,
//! registered on every connection. The database runs in WAL mode: writes go
//! through a single mutex-guarded connection, and every search opens its own
//! read-only connection so searches never wait on each other.

use crate::config::IndexBackend;
use crate::types::{Chunk, EmbeddedChunk, RetrievedCandidate};
use crate::vector_index::{bytes_to_embedding, check_dimension, embedding_to_bytes, normalize, VectorIndex};
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use sift_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);

CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persisted vector index on a SQLite file.
#[derive(Debug)]
pub struct SqliteIndex {
    path: PathBuf,
    dimensions: usize,
    normalize: bool,
    writer: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open or create the database at `path`.
    ///
    /// A database created with a different dimension is rejected with
    /// `AppError::DimensionMismatch`.
    pub fn open(path: &Path, dimensions: usize, normalize: bool) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        register_functions(&conn)?;
        conn.execute_batch(SCHEMA)?;

        check_or_store_meta(&conn, dimensions, normalize)?;

        tracing::debug!(
            "Opened SQLite index at {:?} (journal mode: {}, {} dimensions)",
            path,
            mode,
            dimensions
        );

        Ok(Self {
            path: path.to_path_buf(),
            dimensions,
            normalize,
            writer: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> AppResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        register_functions(&conn)?;
        Ok(conn)
    }
}

impl VectorIndex for SqliteIndex {
    fn backend(&self) -> IndexBackend {
        IndexBackend::Sqlite
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    fn build(&self, chunks: Vec<EmbeddedChunk>) -> AppResult<()> {
        let mut chunks = chunks;
        for chunk in &mut chunks {
            check_dimension(self.dimensions, &chunk.vector)?;
            if self.normalize {
                normalize(&mut chunk.vector);
            }
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let mut conn = self.writer.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (source_id, chunk_index, content, metadata, created_at, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for entry in &chunks {
                stmt.execute(params![
                    entry.chunk.source_id,
                    entry.chunk.chunk_index as i64,
                    entry.chunk.text,
                    serde_json::to_string(&entry.chunk.metadata)?,
                    created_at,
                    embedding_to_bytes(&entry.vector),
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!("Inserted {} chunks into SQLite index", chunks.len());
        Ok(())
    }

    fn append(&self, chunks: Vec<EmbeddedChunk>) -> AppResult<()> {
        self.build(chunks)
    }

    fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<RetrievedCandidate>> {
        check_dimension(self.dimensions, query)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        if self.normalize {
            normalize(&mut query);
        }

        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_id, chunk_index, content, metadata, embedding,
                    vec_dot(embedding, ?1) AS similarity
             FROM chunks
             ORDER BY similarity DESC, id ASC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(
            params![embedding_to_bytes(&query), top_k.min(i64::MAX as usize) as i64],
            |row| Ok((read_chunk(row)?, row.get::<_, f64>(6)?)),
        )?;

        let mut results = Vec::new();
        for row in rows {
            let ((id, chunk), similarity) = row?;
            results.push(RetrievedCandidate {
                id,
                chunk: chunk?,
                similarity: similarity as f32,
            });
        }

        tracing::debug!("Retrieved {} chunks (requested top-{})", results.len(), top_k);
        Ok(results)
    }

    fn len(&self) -> AppResult<usize> {
        let count: i64 = self
            .reader()?
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn chunks(&self) -> AppResult<Vec<EmbeddedChunk>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_id, chunk_index, content, metadata, embedding
             FROM chunks ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], read_chunk)?;
        let mut chunks = Vec::new();
        for row in rows {
            let (_, chunk) = row?;
            chunks.push(chunk?);
        }
        Ok(chunks)
    }

    fn reset(&self) -> AppResult<()> {
        let conn = self.writer.lock();
        conn.execute_batch("DROP TABLE IF EXISTS chunks;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!("Reset SQLite index at {:?}", self.path);
        Ok(())
    }
}

/// Map a row of `(id, source_id, chunk_index, content, metadata, embedding)`.
///
/// Decoding failures of our own encodings surface as the inner `AppResult`
/// rather than a SQLite error.
fn read_chunk(row: &Row<'_>) -> rusqlite::Result<(u64, AppResult<EmbeddedChunk>)> {
    let id: i64 = row.get(0)?;
    let source_id: String = row.get(1)?;
    let chunk_index: i64 = row.get(2)?;
    let content: String = row.get(3)?;
    let metadata: String = row.get(4)?;
    let embedding: Vec<u8> = row.get(5)?;

    let decoded = decode_chunk(source_id, chunk_index, content, &metadata, &embedding);

    Ok((id as u64, decoded))
}

fn decode_chunk(
    source_id: String,
    chunk_index: i64,
    content: String,
    metadata: &str,
    embedding: &[u8],
) -> AppResult<EmbeddedChunk> {
    let chunk = Chunk {
        text: content,
        source_id,
        chunk_index: chunk_index as u32,
        metadata: serde_json::from_str(metadata)?,
    };
    Ok(EmbeddedChunk::new(chunk, bytes_to_embedding(embedding)?))
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "vec_dot",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a = ctx
                .get_raw(0)
                .as_blob()
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            let b = ctx
                .get_raw(1)
                .as_blob()
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;

            if a.len() != b.len() || a.len() % 4 != 0 {
                return Err(rusqlite::Error::UserFunctionError(
                    format!("vec_dot: incompatible vectors ({} and {} bytes)", a.len(), b.len())
                        .into(),
                ));
            }

            let sum: f32 = a
                .chunks_exact(4)
                .zip(b.chunks_exact(4))
                .map(|(x, y)| {
                    f32::from_le_bytes([x[0], x[1], x[2], x[3]])
                        * f32::from_le_bytes([y[0], y[1], y[2], y[3]])
                })
                .sum();
            Ok(sum as f64)
        },
    )
}

fn check_or_store_meta(conn: &Connection, dimensions: usize, normalize: bool) -> AppResult<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM index_meta WHERE key = 'dimensions'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match stored {
        Some(value) => {
            let actual: usize = value.parse().map_err(|_| {
                AppError::Datastore(format!("Corrupt index_meta dimensions value '{}'", value))
            })?;
            if actual != dimensions {
                return Err(AppError::DimensionMismatch {
                    expected: dimensions,
                    actual,
                });
            }

            let stored_normalize: Option<String> = conn
                .query_row(
                    "SELECT value FROM index_meta WHERE key = 'normalize'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(value) = stored_normalize {
                if value != normalize.to_string() {
                    return Err(AppError::Config(format!(
                        "SQLite index was built with normalize = {}, but the base is configured with normalize = {}; rebuild the index",
                        value, normalize
                    )));
                }
            }
        }
        None => {
            conn.execute(
                "INSERT INTO index_meta (key, value) VALUES ('dimensions', ?1), ('normalize', ?2)",
                params![dimensions.to_string(), normalize.to_string()],
            )?;
        }
    }

    Ok(())
}
