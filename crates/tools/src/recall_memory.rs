//! Memory recall tool — lets the model search the user's long-term memory.
//!
//! Bound to one user at construction; the model never supplies a user id.

use async_trait::async_trait;
use oracle_core::error::ToolError;
use oracle_core::memory::{render_recall, MemoryQuery, MemoryStore, UserId};
use oracle_core::tool::{Capability, Tool, ToolOutput, RECALL_TOOL_NAME};
use std::sync::Arc;

pub struct RecallMemoryTool {
    store: Arc<dyn MemoryStore>,
    user_id: UserId,
    limit: usize,
}

impl RecallMemoryTool {
    pub fn new(store: Arc<dyn MemoryStore>, user_id: UserId, limit: usize) -> Self {
        Self { store, user_id, limit }
    }
}

#[async_trait]
impl Tool for RecallMemoryTool {
    fn name(&self) -> &str {
        RECALL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the user's long-term memory for personal facts, preferences and past conversations. Use it for any personal question."
    }

    fn capability(&self) -> Capability {
        Capability::Memory
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for",
                    "minLength": 1
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["query"].as_str().unwrap_or_default();
        let facts = self
            .store
            .recall(&self.user_id, &MemoryQuery::new(query, self.limit))
            .await
            .map_err(|e| ToolError::failed(RECALL_TOOL_NAME, e.to_string()))?;

        let facts: Vec<_> = facts.into_iter().filter(|f| f.user_id == self.user_id).collect();
        Ok(ToolOutput {
            output: render_recall(&facts),
            data: Some(serde_json::json!({ "count": facts.len() })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_core::error::MemoryError;
    use oracle_core::memory::{CommitAck, CommitPayload, MemoryFact};
    use oracle_memory::InMemoryStore;

    struct DownStore;

    #[async_trait]
    impl MemoryStore for DownStore {
        fn name(&self) -> &str { "down" }
        async fn recall(&self, _: &UserId, _: &MemoryQuery) -> Result<Vec<MemoryFact>, MemoryError> {
            Err(MemoryError::Unavailable("connection refused".into()))
        }
        async fn commit(&self, _: &UserId, _: CommitPayload) -> Result<CommitAck, MemoryError> {
            Err(MemoryError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn recalls_only_bound_user() {
        let store = Arc::new(InMemoryStore::new());
        store.commit(&UserId::new("alice"), CommitPayload::Facts(vec!["name is Alice".into()])).await.unwrap();
        store.commit(&UserId::new("bob"), CommitPayload::Facts(vec!["name is Bob".into()])).await.unwrap();

        let tool = RecallMemoryTool::new(store, UserId::new("alice"), 10);
        let out = tool.execute(serde_json::json!({"query": "name"})).await.unwrap();
        assert!(out.output.contains("Alice"));
        assert!(!out.output.contains("Bob"));
    }

    #[tokio::test]
    async fn store_failure_is_tool_error() {
        let tool = RecallMemoryTool::new(Arc::new(DownStore), UserId::new("alice"), 10);
        let err = tool.execute(serde_json::json!({"query": "name"})).await.unwrap_err();
        assert_eq!(err.marker(), "tool_execution_error");
    }
}
