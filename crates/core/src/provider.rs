//! LanguageModel trait — the abstraction over the model backend.
//!
//! The model is consulted twice per turn at most: once to decide what the
//! turn needs (answer directly, recall memory, call a tool, or both), and
//! once more to write the final answer when recall or tool output had to be
//! gathered first. Branching is returned as an explicit [`Decision`] so the
//! orchestrator's control flow does not depend on how the backend encodes it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Utterance;
use crate::tool::ToolDefinition;

/// The assembled, model-facing context for one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelContext {
    /// Instructions plus injected memory and tool sections.
    pub system: String,

    /// Recent transcript tail followed by the current user utterance.
    pub turns: Vec<Utterance>,
}

/// A tool the model asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self { name: name.into(), arguments }
    }
}

/// What the model decided this turn needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Answer from the conversation alone; the reply is final.
    Direct { reply: String },
    /// Fetch facts from long-term memory first.
    Recall { query: String },
    /// Call one tool first.
    ToolCall(ToolRequest),
    /// Recall memory and call a tool first.
    Hybrid { query: String, tool: ToolRequest },
}

/// Intent classification implied by a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Conversational,
    MemoryDependent,
    ToolDependent,
    Hybrid,
}

impl Decision {
    pub fn intent(&self) -> Intent {
        match self {
            Self::Direct { .. } => Intent::Conversational,
            Self::Recall { .. } => Intent::MemoryDependent,
            Self::ToolCall(_) => Intent::ToolDependent,
            Self::Hybrid { .. } => Intent::Hybrid,
        }
    }
}

/// The core LanguageModel trait.
///
/// Implementations: OpenAI-compatible chat completions (Gemini, OpenAI,
/// Ollama), and scripted models in tests.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Decide what this turn needs, given the tools on offer.
    async fn decide(
        &self,
        context: &ModelContext,
        tools: &[ToolDefinition],
    ) -> std::result::Result<Decision, ProviderError>;

    /// Produce the final answer from a fully assembled context.
    async fn generate(&self, context: &ModelContext) -> std::result::Result<String, ProviderError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_intents() {
        let tool = ToolRequest::new("get_local_time", serde_json::json!({}));
        assert_eq!(Decision::Direct { reply: "hi".into() }.intent(), Intent::Conversational);
        assert_eq!(Decision::Recall { query: "name".into() }.intent(), Intent::MemoryDependent);
        assert_eq!(Decision::ToolCall(tool.clone()).intent(), Intent::ToolDependent);
        assert_eq!(
            Decision::Hybrid { query: "city".into(), tool }.intent(),
            Intent::Hybrid
        );
    }

    #[test]
    fn decision_serialization_is_tagged() {
        let d = Decision::Recall { query: "favourite colour".into() };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains(r#""kind":"recall""#));
        let back: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
