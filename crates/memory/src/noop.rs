//! No-op memory store — disables persistent memory entirely.

use async_trait::async_trait;
use oracle_core::error::MemoryError;
use oracle_core::memory::{CommitAck, CommitPayload, MemoryFact, MemoryQuery, MemoryStore, UserId};

/// A no-op memory store that stores nothing and recalls nothing.
pub struct NoopStore;

#[async_trait]
impl MemoryStore for NoopStore {
    fn name(&self) -> &str { "none" }

    async fn recall(&self, _user_id: &UserId, _query: &MemoryQuery) -> Result<Vec<MemoryFact>, MemoryError> {
        Ok(Vec::new())
    }

    async fn commit(&self, _user_id: &UserId, _payload: CommitPayload) -> Result<CommitAck, MemoryError> {
        Ok(CommitAck { stored: 0 })
    }
}
