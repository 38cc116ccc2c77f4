//! MemoryStore trait — per-user long-term facts.
//!
//! The memory system lets the agent remember facts across sessions. Facts are
//! append-only and every operation is scoped by a [`UserId`]; a store must
//! never return or touch facts owned by another user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;
use crate::message::Utterance;

/// Memory isolation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a fact came to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactSource {
    /// Written at session end from the transcript
    Passive,
    /// Written explicitly mid-session or by the user
    Active,
}

/// A single long-term fact about a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryFact {
    pub user_id: UserId,
    pub content: String,
    pub source: FactSource,
    pub created_at: DateTime<Utc>,
}

impl MemoryFact {
    pub fn new(user_id: UserId, content: impl Into<String>, source: FactSource) -> Self {
        Self {
            user_id,
            content: content.into(),
            source,
            created_at: Utc::now(),
        }
    }
}

/// A recall query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// The search text
    pub text: String,

    /// Maximum number of results
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

impl MemoryQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self { text: text.into(), limit }
    }
}

/// What gets written by `commit`.
#[derive(Debug, Clone)]
pub enum CommitPayload {
    /// Explicit facts (content only; ownership comes from the commit's user id).
    Facts(Vec<String>),
    /// A session transcript, flushed at shutdown.
    Transcript(Vec<Utterance>),
}

impl CommitPayload {
    /// Number of items carried.
    pub fn len(&self) -> usize {
        match self {
            Self::Facts(f) => f.len(),
            Self::Transcript(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Acknowledgement for a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAck {
    /// How many facts the store recorded (remote stores may infer fewer or more).
    pub stored: usize,
}

/// The core MemoryStore trait.
///
/// Implementations: in-memory (testing), JSONL file, mem0 (remote), none.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "file", "mem0", "none").
    fn name(&self) -> &str;

    /// Relevance-ranked facts for `user_id`. Possibly empty. Must not mutate
    /// the store, so repeated calls with no commit in between agree.
    async fn recall(
        &self,
        user_id: &UserId,
        query: &MemoryQuery,
    ) -> std::result::Result<Vec<MemoryFact>, MemoryError>;

    /// Append facts or a transcript for `user_id`.
    async fn commit(
        &self,
        user_id: &UserId,
        payload: CommitPayload,
    ) -> std::result::Result<CommitAck, MemoryError>;
}

/// Render a recall result the way the agent sees it.
pub fn render_recall(facts: &[MemoryFact]) -> String {
    if facts.is_empty() {
        return "No relevant memory found.".into();
    }
    let mut out = String::from("Relevant memories:");
    for fact in facts {
        out.push_str("\n- ");
        out.push_str(fact.content.trim());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_query_defaults() {
        let query: MemoryQuery = serde_json::from_str(r#"{"text":"name"}"#).unwrap();
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn fact_serialization() {
        let fact = MemoryFact::new(UserId::new("alice"), "name is Alice", FactSource::Active);
        let json = serde_json::to_string(&fact).unwrap();
        assert!(json.contains(r#""user_id":"alice""#));
        assert!(json.contains(r#""source":"active""#));
    }

    #[test]
    fn render_recall_empty_and_filled() {
        assert_eq!(render_recall(&[]), "No relevant memory found.");
        let facts = vec![MemoryFact::new(UserId::new("a"), "likes tea ", FactSource::Passive)];
        assert_eq!(render_recall(&facts), "Relevant memories:\n- likes tea");
    }

    #[test]
    fn payload_len() {
        let p = CommitPayload::Transcript(vec![Utterance::user("hi"), Utterance::agent("hello")]);
        assert_eq!(p.len(), 2);
        assert!(CommitPayload::Facts(vec![]).is_empty());
    }
}
