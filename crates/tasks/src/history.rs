//! Durable, bounded conversation history.
//!
//! Each conversation lives in `<dir>/<id>.json` and keeps its full message
//! log on disk until cleared. In memory only the most recent `window`
//! messages are held. Every conversation id has its own lock, so appends to
//! different conversations never wait on each other while appends to the same
//! conversation are serialized.
//!
//! All methods do blocking file I/O; async callers should run them on
//! `tokio::task::spawn_blocking`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SUMMARY_PREVIEW_CHARS: usize = 100;

/// Past this many cached conversations, idle slots are dropped on insert.
const MAX_IDLE_SLOTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
}

impl Role {
    /// Speaker label used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "Human",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "type")]
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// On-disk record of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub conversation_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub last_updated: DateTime<Utc>,
}

impl ConversationHistory {
    fn empty(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            messages: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub message_count: usize,
    pub last_message: Option<String>,
    pub last_role: Option<Role>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// In-memory state of one conversation.
#[derive(Debug, Default)]
struct Slot {
    loaded: bool,
    window: VecDeque<Message>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct ConversationHistoryManager {
    dir: PathBuf,
    window: usize,
    slots: Mutex<HashMap<String, Arc<Mutex<Slot>>>>,
}

/// Ids become file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_conversation_id(id: &str) -> AppResult<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Task(format!(
            "Invalid conversation id '{}': use letters, digits, '_' or '-'",
            id
        )))
    }
}

/// A fresh random conversation id.
pub fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Write `bytes` to `path` via a synced temp file and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("history.json");
    let tmp = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name,
        uuid::Uuid::new_v4().simple()
    ));

    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result?;
    sync_parent(path)
}

/// Flush the directory entry so the rename itself survives a power loss.
#[cfg(unix)]
fn sync_parent(path: &Path) -> AppResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> AppResult<()> {
    Ok(())
}

impl ConversationHistoryManager {
    /// Manager over `dir`, keeping `window` messages per conversation in memory.
    pub fn new(dir: impl Into<PathBuf>, window: usize) -> Self {
        Self {
            dir: dir.into(),
            window: window.max(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn window(&self) -> usize {
        self.window
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn slot(&self, id: &str) -> AppResult<Arc<Mutex<Slot>>> {
        validate_conversation_id(id)?;
        let mut slots = self.slots.lock();
        if !slots.contains_key(id) && slots.len() >= MAX_IDLE_SLOTS {
            // Only the map holds an idle slot, so nobody can be waiting on it
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        Ok(Arc::clone(slots.entry(id.to_string()).or_default()))
    }

    /// Forget the cached slot for `id` unless another caller still holds it.
    fn evict(&self, id: &str) {
        let mut slots = self.slots.lock();
        if slots.get(id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(id);
        }
    }

    fn read_record(&self, id: &str) -> AppResult<ConversationHistory> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(ConversationHistory::empty(id));
        }

        let contents = std::fs::read_to_string(&path)?;
        let mut record: ConversationHistory = serde_json::from_str(&contents).map_err(|e| {
            AppError::Task(format!("Corrupt conversation file {:?}: {}", path, e))
        })?;
        record.conversation_id = id.to_string();
        Ok(record)
    }

    fn write_record(&self, record: &ConversationHistory) -> AppResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.path_for(&record.conversation_id), &bytes)
    }

    fn fill_window(&self, slot: &mut Slot, record: &ConversationHistory) {
        let skip = record.messages.len().saturating_sub(self.window);
        slot.window = record.messages.iter().skip(skip).cloned().collect();
        slot.last_updated = Some(record.last_updated);
        slot.loaded = true;
    }

    fn ensure_loaded(&self, id: &str, slot: &mut Slot) -> AppResult<()> {
        if !slot.loaded {
            let record = self.read_record(id)?;
            self.fill_window(slot, &record);
        }
        Ok(())
    }

    /// The windowed history for `id`; unknown ids give an empty history.
    pub fn get_or_create(&self, id: &str) -> AppResult<ConversationHistory> {
        let slot = self.slot(id)?;
        let mut slot = slot.lock();
        self.ensure_loaded(id, &mut slot)?;

        Ok(ConversationHistory {
            conversation_id: id.to_string(),
            messages: slot.window.iter().cloned().collect(),
            last_updated: slot.last_updated.unwrap_or_else(Utc::now),
        })
    }

    fn append(&self, id: &str, role: Role, content: &str) -> AppResult<()> {
        let slot = self.slot(id)?;
        let mut slot = slot.lock();

        let mut record = self.read_record(id)?;
        let now = Utc::now();
        // Keep timestamps monotonic even if the wall clock steps back
        let timestamp = match record.messages.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        record.messages.push(Message {
            role,
            content: content.to_string(),
            timestamp,
        });
        record.last_updated = timestamp;
        self.write_record(&record)?;

        self.fill_window(&mut slot, &record);
        tracing::debug!(
            "Appended {:?} message to conversation {} ({} total)",
            role,
            id,
            record.messages.len()
        );
        Ok(())
    }

    pub fn append_user(&self, id: &str, content: &str) -> AppResult<()> {
        self.append(id, Role::User, content)
    }

    pub fn append_assistant(&self, id: &str, content: &str) -> AppResult<()> {
        self.append(id, Role::Assistant, content)
    }

    /// The most recent `limit` messages, oldest first.
    pub fn messages(&self, id: &str, limit: usize) -> AppResult<Vec<Message>> {
        let slot = self.slot(id)?;
        let mut slot = slot.lock();
        self.ensure_loaded(id, &mut slot)?;

        let skip = slot.window.len().saturating_sub(limit);
        Ok(slot.window.iter().skip(skip).cloned().collect())
    }

    /// The most recent `limit` messages as `Human: ...` / `Assistant: ...` lines.
    pub fn get_context(&self, id: &str, limit: usize) -> AppResult<String> {
        let lines: Vec<String> = self
            .messages(id, limit)?
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect();
        Ok(lines.join("\n"))
    }

    /// Drop every message, keeping an empty record on disk.
    pub fn clear(&self, id: &str) -> AppResult<()> {
        let slot = self.slot(id)?;
        let mut slot = slot.lock();

        let record = ConversationHistory::empty(id);
        self.write_record(&record)?;
        self.fill_window(&mut slot, &record);

        tracing::info!("Cleared conversation {}", id);
        Ok(())
    }

    /// Remove the conversation file entirely. Returns whether it existed.
    pub fn delete(&self, id: &str) -> AppResult<bool> {
        let existed = {
            let slot = self.slot(id)?;
            let mut guard = slot.lock();

            let path = self.path_for(id);
            let existed = path.exists();
            if existed {
                std::fs::remove_file(&path)?;
            }
            *guard = Slot::default();
            existed
        };
        self.evict(id);

        tracing::info!("Deleted conversation {}", id);
        Ok(existed)
    }

    /// Ids of every stored conversation, sorted.
    pub fn conversation_ids(&self) -> AppResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .filter(|id| validate_conversation_id(id).is_ok())
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Message count and last message of a stored conversation.
    pub fn summary(&self, id: &str) -> AppResult<ConversationSummary> {
        let slot = self.slot(id)?;
        let _guard = slot.lock();

        let record = self.read_record(id)?;
        let last = record.messages.last();

        Ok(ConversationSummary {
            conversation_id: id.to_string(),
            message_count: record.messages.len(),
            last_message: last.map(|m| {
                if m.content.chars().count() > SUMMARY_PREVIEW_CHARS {
                    let preview: String = m.content.chars().take(SUMMARY_PREVIEW_CHARS).collect();
                    format!("{}...", preview)
                } else {
                    m.content.clone()
                }
            }),
            last_role: last.map(|m| m.role),
            last_updated: last.map(|_| record.last_updated),
        })
    }
}
