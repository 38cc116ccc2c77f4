//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent access to real-world data: the clock, the
//! weather, the web, email, and long-term memory. Each tool declares a
//! [`ToolSpec`]; the [`ToolRegistry`] is built once and is immutable after
//! that.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::error::ToolError;
use crate::schema::validate_arguments;

/// Name of the memory lookup tool. A call to it is a recall, not a tool turn.
pub const RECALL_TOOL_NAME: &str = "recall_memory";

/// Capability tag of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Time,
    Weather,
    Search,
    Email,
    Memory,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Time => "time",
            Self::Weather => "weather",
            Self::Search => "search",
            Self::Email => "email",
            Self::Memory => "memory",
        };
        f.write_str(s)
    }
}

/// The static declaration of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
    pub capability: Capability,
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
        }
    }
}

/// Successful tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text handed to the model
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self { output: output.into(), data: None }
    }
}

/// One tool call within a turn: what was asked, what came back, how long it took.
/// Never persisted.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub outcome: Result<ToolOutput, ToolError>,
    pub duration: Duration,
}

impl ToolInvocation {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// The core Tool trait.
///
/// Each built-in tool implements this trait and is registered in the
/// ToolRegistry at session activation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Capability tag.
    fn capability(&self) -> Capability;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool. Arguments have already been validated against
    /// `parameters_schema`.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolOutput, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
            capability: self.capability(),
        }
    }
}

struct RegisteredTool {
    spec: ToolSpec,
    handler: Arc<dyn Tool>,
}

/// Collects tools before the registry is frozen.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistryBuilder {
    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        let spec = tool.spec();
        self.tools.insert(spec.name.clone(), RegisteredTool { spec, handler: tool });
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}

/// An immutable registry of available tools.
///
/// The orchestrator uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Resolve, validate and invoke tools the model requests
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// An empty registry.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// Resolve a tool name to its spec.
    pub fn resolve(&self, name: &str) -> Result<&ToolSpec, ToolError> {
        self.tools
            .get(name)
            .map(|t| &t.spec)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Tool definitions in name order (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| ToolDefinition::from(&t.spec)).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve, validate and execute a tool under `timeout`.
    ///
    /// Every failure mode (unknown name, bad arguments, timeout, the tool's
    /// own error) comes back as a `ToolError` inside the invocation.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> ToolInvocation {
        let start = Instant::now();
        let outcome = self.run(name, &arguments, timeout).await;
        ToolInvocation {
            tool_name: name.to_string(),
            arguments,
            outcome,
            duration: start.elapsed(),
        }
    }

    async fn run(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        timeout: Duration,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        validate_arguments(name, &tool.spec.parameters, arguments)?;

        match tokio::time::timeout(timeout, tool.handler.execute(arguments.clone())).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: name.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn capability(&self) -> Capability { Capability::Search }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolOutput, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolOutput::text(text))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str { "slow" }
        fn description(&self) -> &str { "Never finishes in time" }
        fn capability(&self) -> Capability { Capability::Weather }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> std::result::Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolOutput::text("too late"))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::builder()
            .register(Arc::new(EchoTool))
            .register(Arc::new(SlowTool))
            .build()
    }

    #[test]
    fn registry_register_and_resolve() {
        let registry = registry();
        assert_eq!(registry.resolve("echo").unwrap().capability, Capability::Search);
        assert!(matches!(registry.resolve("nonexistent"), Err(ToolError::NotFound(_))));
    }

    #[test]
    fn registry_definitions_are_sorted() {
        let defs = registry().definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[1].name, "slow");
    }

    #[tokio::test]
    async fn registry_invoke_tool() {
        let inv = registry()
            .invoke("echo", serde_json::json!({"text": "hello world"}), Duration::from_secs(5))
            .await;
        assert_eq!(inv.tool_name, "echo");
        assert_eq!(inv.outcome.unwrap().output, "hello world");
    }

    #[tokio::test]
    async fn registry_invoke_missing_tool() {
        let inv = registry().invoke("nonexistent", serde_json::json!({}), Duration::from_secs(5)).await;
        assert!(matches!(inv.outcome, Err(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn registry_rejects_invalid_arguments() {
        let inv = registry().invoke("echo", serde_json::json!({"text": 7}), Duration::from_secs(5)).await;
        assert!(matches!(inv.outcome, Err(ToolError::InvalidArguments { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn registry_times_out_slow_tool() {
        let inv = registry().invoke("slow", serde_json::json!({}), Duration::from_secs(2)).await;
        match inv.outcome {
            Err(ToolError::Timeout { tool_name, timeout_secs }) => {
                assert_eq!(tool_name, "slow");
                assert_eq!(timeout_secs, 2);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
