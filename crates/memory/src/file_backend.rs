//! File-based memory store — persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `MemoryFact`, tagged with its owner. Commits
//! only ever append, so an interrupted write can at worst leave a truncated
//! last line, which is skipped on load.
//!
//! Storage location: `~/.oracle/memory/facts.jsonl`

use async_trait::async_trait;
use oracle_core::error::MemoryError;
use oracle_core::memory::{CommitAck, CommitPayload, MemoryFact, MemoryQuery, MemoryStore, UserId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use crate::relevance;

/// A file-backed memory store using JSONL (one JSON object per line).
///
/// Facts are loaded into memory on creation; commits append to the file and
/// then to the in-memory copy.
pub struct FileStore {
    path: PathBuf,
    facts: Arc<RwLock<Vec<MemoryFact>>>,
}

impl FileStore {
    /// Create a new file-based store at the given path.
    ///
    /// If the file exists, facts are loaded from it.
    /// If the file does not exist, starts empty (file created on first write).
    pub fn new(path: PathBuf) -> Self {
        let facts = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = facts.len(), "File memory store loaded");
        Self {
            path,
            facts: Arc::new(RwLock::new(facts)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load facts from a JSONL file.
    fn load_from_disk(path: &Path) -> Vec<MemoryFact> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // File doesn't exist yet
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryFact>(line) {
                Ok(fact) => Some(fact),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory line");
                    None
                }
            })
            .collect()
    }

    /// Append facts to disk in a single write.
    async fn append(&self, facts: &[MemoryFact]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::CommitFailed(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut buf = String::new();
        for fact in facts {
            let line = serde_json::to_string(fact)
                .map_err(|e| MemoryError::CommitFailed(format!("Failed to serialize fact: {e}")))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| MemoryError::CommitFailed(format!("Failed to open memory file: {e}")))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| MemoryError::CommitFailed(format!("Failed to write memory file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| MemoryError::CommitFailed(format!("Failed to flush memory file: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn recall(&self, user_id: &UserId, query: &MemoryQuery) -> Result<Vec<MemoryFact>, MemoryError> {
        let facts = self.facts.read().await;
        let owned = facts.iter().filter(|f| &f.user_id == user_id);
        Ok(relevance::rank(owned, &query.text, query.limit))
    }

    async fn commit(&self, user_id: &UserId, payload: CommitPayload) -> Result<CommitAck, MemoryError> {
        let new_facts = match &payload {
            CommitPayload::Facts(contents) => relevance::explicit_facts(user_id, contents),
            CommitPayload::Transcript(utterances) => relevance::transcript_facts(user_id, utterances),
        };
        if new_facts.is_empty() {
            return Ok(CommitAck { stored: 0 });
        }

        // Hold the write lock across the append so concurrent commits keep
        // file order and memory order identical.
        let mut facts = self.facts.write().await;
        self.append(&new_facts).await?;
        let stored = new_facts.len();
        facts.extend(new_facts);
        debug!(user_id = %user_id, stored, "Committed facts to file");
        Ok(CommitAck { stored })
    }
}
