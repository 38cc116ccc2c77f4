//! Shared test doubles for orchestrator and session tests.

use async_trait::async_trait;
use oracle_core::error::{MemoryError, ProviderError, ToolError};
use oracle_core::memory::{CommitAck, CommitPayload, MemoryFact, MemoryQuery, MemoryStore, UserId};
use oracle_core::provider::{Decision, LanguageModel, ModelContext};
use oracle_core::tool::{Capability, Tool, ToolDefinition, ToolOutput};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Generator = Box<dyn Fn(&ModelContext) -> Result<String, ProviderError> + Send + Sync>;

/// A model that returns scripted decisions and builds final answers with a
/// closure over the assembled context.
///
/// When the decision queue runs dry, `decide` answers `Direct` with the
/// generator's output.
pub struct ScriptedModel {
    decisions: Mutex<VecDeque<Result<Decision, ProviderError>>>,
    generator: Generator,
    decide_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    contexts: Mutex<Vec<ModelContext>>,
}

impl ScriptedModel {
    pub fn new(
        decisions: Vec<Decision>,
        generator: impl Fn(&ModelContext) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            decisions: Mutex::new(decisions.into_iter().map(Ok).collect()),
            generator: Box::new(move |ctx| Ok(generator(ctx))),
            decide_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// A model that always answers directly with `reply`.
    pub fn direct(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(vec![], move |_| reply.clone())
    }

    /// A model whose every call fails.
    pub fn failing() -> Self {
        Self {
            decisions: Mutex::new(VecDeque::new()),
            generator: Box::new(|_| Err(ProviderError::Network("connection reset".into()))),
            decide_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn decide_calls(&self) -> usize {
        self.decide_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Every context passed to `generate`, in order.
    pub fn generated_contexts(&self) -> Vec<ModelContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(&self, context: &ModelContext, _tools: &[ToolDefinition]) -> Result<Decision, ProviderError> {
        self.decide_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.decisions.lock().unwrap().pop_front();
        match next {
            Some(decision) => decision,
            None => (self.generator)(context).map(|reply| Decision::Direct { reply }),
        }
    }

    async fn generate(&self, context: &ModelContext) -> Result<String, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.clone());
        (self.generator)(context)
    }
}

/// The line after a `# TOOL RESULT` heading, if any.
pub fn tool_result_line(context: &ModelContext) -> Option<String> {
    let mut lines = context.system.lines();
    lines.find(|l| l.starts_with("# TOOL RESULT"))?;
    lines.next().map(String::from)
}

/// A memory store that is always unreachable, counting attempts.
#[derive(Default)]
pub struct DownStore {
    pub recalls: AtomicUsize,
    pub commits: AtomicUsize,
    pub committed_sizes: Mutex<Vec<usize>>,
}

#[async_trait]
impl MemoryStore for DownStore {
    fn name(&self) -> &str {
        "down"
    }

    async fn recall(&self, _: &UserId, _: &MemoryQuery) -> Result<Vec<MemoryFact>, MemoryError> {
        self.recalls.fetch_add(1, Ordering::SeqCst);
        Err(MemoryError::Unavailable("connection refused".into()))
    }

    async fn commit(&self, _: &UserId, payload: CommitPayload) -> Result<CommitAck, MemoryError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.committed_sizes.lock().unwrap().push(payload.len());
        Err(MemoryError::CommitFailed("503 service unavailable".into()))
    }
}

/// A memory store whose commits never finish.
pub struct HangingStore;

#[async_trait]
impl MemoryStore for HangingStore {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn recall(&self, _: &UserId, _: &MemoryQuery) -> Result<Vec<MemoryFact>, MemoryError> {
        Ok(Vec::new())
    }

    async fn commit(&self, _: &UserId, _: CommitPayload) -> Result<CommitAck, MemoryError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(CommitAck { stored: 0 })
    }
}

/// A memory store that accepts requests and never answers them.
#[derive(Default)]
pub struct StalledStore {
    pub recalls: AtomicUsize,
}

#[async_trait]
impl MemoryStore for StalledStore {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn recall(&self, _: &UserId, _: &MemoryQuery) -> Result<Vec<MemoryFact>, MemoryError> {
        self.recalls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    async fn commit(&self, _: &UserId, payload: CommitPayload) -> Result<CommitAck, MemoryError> {
        Ok(CommitAck { stored: payload.len() })
    }
}

/// A store that ignores the user id and returns every fact it holds.
pub struct LeakyStore {
    pub facts: Vec<MemoryFact>,
}

#[async_trait]
impl MemoryStore for LeakyStore {
    fn name(&self) -> &str {
        "leaky"
    }

    async fn recall(&self, _: &UserId, _: &MemoryQuery) -> Result<Vec<MemoryFact>, MemoryError> {
        Ok(self.facts.clone())
    }

    async fn commit(&self, _: &UserId, payload: CommitPayload) -> Result<CommitAck, MemoryError> {
        Ok(CommitAck { stored: payload.len() })
    }
}

/// A weather tool that sleeps far past any sensible timeout.
pub struct StalledWeather;

#[async_trait]
impl Tool for StalledWeather {
    fn name(&self) -> &str {
        "get_weather"
    }
    fn description(&self) -> &str {
        "Weather that never answers"
    }
    fn capability(&self) -> Capability {
        Capability::Weather
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"city": {"type": "string"}}})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ToolOutput::text("sunny"))
    }
}

/// Wrap any tool so its completion is observable.
pub struct ObservedTool<T> {
    pub inner: T,
    pub finished: Arc<std::sync::atomic::AtomicBool>,
}

#[async_trait]
impl<T: Tool> Tool for ObservedTool<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn description(&self) -> &str {
        self.inner.description()
    }
    fn capability(&self) -> Capability {
        self.inner.capability()
    }
    fn parameters_schema(&self) -> serde_json::Value {
        self.inner.parameters_schema()
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let out = self.inner.execute(arguments).await;
        self.finished.store(true, Ordering::SeqCst);
        out
    }
}
