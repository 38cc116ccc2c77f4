//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use oracle_core::error::MemoryError;
use oracle_core::memory::{CommitAck, CommitPayload, MemoryFact, MemoryQuery, MemoryStore, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::relevance;

/// An in-memory store that keeps one fact list per user.
/// Useful for testing and sessions where persistence isn't needed.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    facts: Arc<RwLock<HashMap<UserId, Vec<MemoryFact>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total facts stored for one user.
    pub async fn count(&self, user_id: &UserId) -> usize {
        self.facts.read().await.get(user_id).map_or(0, Vec::len)
    }

    /// Snapshot of one user's facts in insertion order.
    pub async fn facts(&self, user_id: &UserId) -> Vec<MemoryFact> {
        self.facts.read().await.get(user_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str { "in_memory" }

    async fn recall(&self, user_id: &UserId, query: &MemoryQuery) -> Result<Vec<MemoryFact>, MemoryError> {
        let facts = self.facts.read().await;
        let Some(owned) = facts.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(relevance::rank(owned.iter(), &query.text, query.limit))
    }

    async fn commit(&self, user_id: &UserId, payload: CommitPayload) -> Result<CommitAck, MemoryError> {
        let new_facts = match &payload {
            CommitPayload::Facts(contents) => relevance::explicit_facts(user_id, contents),
            CommitPayload::Transcript(utterances) => relevance::transcript_facts(user_id, utterances),
        };
        let stored = new_facts.len();
        self.facts
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .extend(new_facts);
        Ok(CommitAck { stored })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_core::message::Utterance;

    fn alice() -> UserId { UserId::new("alice") }
    fn bob() -> UserId { UserId::new("bob") }

    #[tokio::test]
    async fn commit_and_recall() {
        let mem = InMemoryStore::new();
        mem.commit(&alice(), CommitPayload::Facts(vec!["name is Alice".into()])).await.unwrap();

        let results = mem.recall(&alice(), &MemoryQuery::new("What's my name?", 10)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "name is Alice");
        assert_eq!(results[0].user_id, alice());
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let mem = InMemoryStore::new();
        mem.commit(&alice(), CommitPayload::Facts(vec!["name is Alice".into()])).await.unwrap();
        mem.commit(&bob(), CommitPayload::Facts(vec!["name is Bob".into()])).await.unwrap();

        for query in ["name", "", "Bob"] {
            let results = mem.recall(&alice(), &MemoryQuery::new(query, 10)).await.unwrap();
            assert!(results.iter().all(|f| f.user_id == alice()), "leak for query {query:?}");
        }
        assert!(mem.recall(&UserId::new("carol"), &MemoryQuery::new("name", 10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recall_is_idempotent() {
        let mem = InMemoryStore::new();
        mem.commit(&alice(), CommitPayload::Facts(vec![
            "favourite colour is blue".into(),
            "favourite food is dosa".into(),
        ])).await.unwrap();

        let q = MemoryQuery::new("favourite", 10);
        let first = mem.recall(&alice(), &q).await.unwrap();
        let second = mem.recall(&alice(), &q).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn transcript_commit_appends() {
        let mem = InMemoryStore::new();
        let ack = mem
            .commit(&alice(), CommitPayload::Transcript(vec![
                Utterance::user("I live in Gotham"),
                Utterance::agent("Noted, Mr. Wayne."),
            ]))
            .await
            .unwrap();
        assert_eq!(ack.stored, 2);
        assert_eq!(mem.count(&alice()).await, 2);

        mem.commit(&alice(), CommitPayload::Facts(vec!["likes tea".into()])).await.unwrap();
        assert_eq!(mem.count(&alice()).await, 3);
    }
}
