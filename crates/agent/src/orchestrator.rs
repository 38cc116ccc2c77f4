//! The turn orchestrator — one user utterance in, one agent response out.
//!
//! Each turn follows a **Decide → Gather → Answer** cycle:
//!
//! 1. **Decide**: the model sees the conversation and the tool declarations
//!    and returns a [`Decision`]
//! 2. **Gather**: recall memory and/or invoke a tool, concurrently
//! 3. **Answer**: assemble a fresh context with what was gathered and ask
//!    the model for the final reply
//! 4. **Record**: append the user utterance and the reply to the transcript
//!
//! A `Direct` decision already carries the reply, so conversational turns
//! take a single model call. Tool and memory failures never fail the turn;
//! they are injected into the context so the model can explain them.

use crate::context::{AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler};
use crate::prompts;
use chrono::Utc;
use oracle_config::SessionConfig;
use oracle_core::error::MemoryError;
use oracle_core::event::{DomainEvent, EventBus};
use oracle_core::memory::{MemoryFact, MemoryQuery, MemoryStore, UserId};
use oracle_core::message::{SessionId, Transcript, Utterance};
use oracle_core::provider::{Decision, Intent, LanguageModel, ToolRequest};
use oracle_core::tool::{ToolInvocation, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mutable per-session state the orchestrator works on.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// Facts preloaded at session start.
    pub passive_facts: Vec<MemoryFact>,
    pub transcript: Transcript,
}

impl SessionState {
    pub fn new(user_id: UserId) -> Self {
        Self {
            session_id: SessionId::new(),
            user_id,
            passive_facts: Vec::new(),
            transcript: Transcript::new(),
        }
    }
}

/// The outcome of one turn.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Text to speak back to the user.
    pub text: String,
    /// What the turn turned out to need.
    pub intent: Intent,
    /// Facts recalled this turn (`None` if no recall ran or memory was unreachable).
    pub recalled: Option<Vec<MemoryFact>>,
    /// The tool call made this turn, if any.
    pub tool: Option<ToolInvocation>,
    /// Assembly metadata of the context the reply was generated from.
    pub metadata: AssemblyMetadata,
}

/// Runs turns against a model, a memory store and a frozen tool registry.
pub struct TurnOrchestrator {
    model: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryStore>,
    tools: Arc<ToolRegistry>,
    config: Arc<SessionConfig>,
    assembler: ContextAssembler,
    instructions: String,
    event_bus: Arc<EventBus>,
}

impl TurnOrchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        tools: Arc<ToolRegistry>,
        config: Arc<SessionConfig>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let instructions = prompts::agent_instructions(&config.persona, &config.default_city);
        let assembler = ContextAssembler::new(config.max_context_tokens)
            .with_facts_heading(prompts::facts_heading(&config.persona));
        Self {
            model,
            memory,
            tools,
            config,
            assembler,
            instructions,
            event_bus,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Process one user utterance.
    ///
    /// Returns an error only when the model itself cannot be reached; in
    /// that case nothing is recorded and the caller decides how to recover.
    pub async fn handle_turn(
        &self,
        text: &str,
        state: &mut SessionState,
    ) -> oracle_core::Result<AgentResponse> {
        let utterance = Utterance::user(text.trim());
        info!(
            session_id = %state.session_id,
            user_id = %state.user_id,
            history = state.transcript.len(),
            "Handling turn"
        );
        self.event_bus.publish(DomainEvent::UtteranceReceived {
            session_id: state.session_id.to_string(),
            content_preview: utterance.text().chars().take(50).collect(),
            timestamp: Utc::now(),
        });

        // ── Decide ──
        let decide_ctx = self.assemble(state, &utterance, None, None);
        let decision = self
            .model
            .decide(&decide_ctx.context, &self.tools.definitions())
            .await?;
        debug!(intent = ?decision.intent(), "Model decision");

        let (recall_query, tool_request) = match decision {
            Decision::Direct { reply } => {
                return Ok(self.finish(state, utterance, reply, Intent::Conversational, None, None, decide_ctx.metadata));
            }
            Decision::Recall { query } => (Some(query), None),
            Decision::ToolCall(request) => (None, Some(request)),
            Decision::Hybrid { query, tool } => (Some(query), Some(tool)),
        };

        // ── Gather ──
        let user_id = state.user_id.clone();
        let fallback_query = utterance.text().to_string();
        let (recalled, invocation) = tokio::join!(
            async {
                match recall_query {
                    Some(query) => self.recall(&user_id, &query, &fallback_query).await,
                    None => None,
                }
            },
            async {
                match tool_request {
                    Some(request) => Some(self.invoke(request).await),
                    None => None,
                }
            },
        );

        let has_memory = recalled.as_ref().is_some_and(|facts| !facts.is_empty());
        let intent = match (has_memory, invocation.is_some()) {
            (true, true) => Intent::Hybrid,
            (true, false) => Intent::MemoryDependent,
            (false, true) => Intent::ToolDependent,
            (false, false) => Intent::Conversational,
        };

        // ── Answer ──
        let answer_ctx = self.assemble(state, &utterance, recalled.as_deref(), invocation.as_ref());
        let reply = self.model.generate(&answer_ctx.context).await?;

        Ok(self.finish(state, utterance, reply, intent, recalled, invocation, answer_ctx.metadata))
    }

    /// Ask the model for an opening greeting and record it.
    pub async fn greet(&self, state: &mut SessionState, hour: u32) -> oracle_core::Result<String> {
        let instructions = format!(
            "{}\n\n{}",
            self.instructions,
            prompts::session_instructions(&self.config.persona, hour)
        );
        let cue = Utterance::user(prompts::GREETING_CUE);
        let assembled = self.assembler.build(&AssemblyInput {
            instructions: &instructions,
            passive_facts: &state.passive_facts,
            recalled: None,
            tool_result: None,
            transcript: state.transcript.utterances(),
            current: Some(&cue),
        });
        let greeting = self.model.generate(&assembled.context).await?;
        state.transcript.push(Utterance::agent(greeting.trim()));
        Ok(greeting.trim().to_string())
    }

    fn assemble(
        &self,
        state: &SessionState,
        utterance: &Utterance,
        recalled: Option<&[MemoryFact]>,
        tool_result: Option<&ToolInvocation>,
    ) -> AssembledContext {
        let assembled = self.assembler.build(&AssemblyInput {
            instructions: &self.instructions,
            passive_facts: &state.passive_facts,
            recalled,
            tool_result,
            transcript: state.transcript.utterances(),
            current: Some(utterance),
        });

        if let Some(required_tokens) = assembled.metadata.overflow {
            let err = oracle_core::Error::ContextOverflow {
                required_tokens,
                budget: assembled.metadata.budget,
            };
            warn!(error = %err, "Current turn alone exceeds the context budget; sending it whole");
        }
        assembled
    }

    async fn recall(&self, user_id: &UserId, query: &str, fallback: &str) -> Option<Vec<MemoryFact>> {
        let query = if query.trim().is_empty() { fallback } else { query };
        let started = std::time::Instant::now();

        let memory_query = MemoryQuery::new(query, self.config.recall_limit);
        let recall = self.memory.recall(user_id, &memory_query);
        match recall_within(self.config.memory_timeout, recall).await {
            Ok(facts) => {
                let returned = facts.len();
                let owned: Vec<MemoryFact> = facts.into_iter().filter(|f| &f.user_id == user_id).collect();
                if owned.len() < returned {
                    warn!(
                        user_id = %user_id,
                        dropped = returned - owned.len(),
                        "Memory store returned facts owned by another user; dropped"
                    );
                }
                debug!(
                    user_id = %user_id,
                    count = owned.len(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Recalled memories"
                );
                self.event_bus.publish(DomainEvent::MemoryRecalled {
                    user_id: user_id.to_string(),
                    count: owned.len(),
                    timestamp: Utc::now(),
                });
                Some(owned)
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Memory unavailable; answering without recall");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "memory_recall".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                None
            }
        }
    }

    async fn invoke(&self, request: ToolRequest) -> ToolInvocation {
        let timeout = self.config.timeout_for(&request.name);
        let invocation = self.tools.invoke(&request.name, request.arguments, timeout).await;
        let duration_ms = invocation.duration.as_millis() as u64;

        match &invocation.outcome {
            Ok(_) => info!(tool = %invocation.tool_name, duration_ms, "Tool succeeded"),
            Err(e) => warn!(
                tool = %invocation.tool_name,
                marker = e.marker(),
                error = %e,
                duration_ms,
                "Tool failed"
            ),
        }

        self.event_bus.publish(DomainEvent::ToolInvoked {
            tool_name: invocation.tool_name.clone(),
            success: invocation.succeeded(),
            error_marker: invocation.outcome.as_ref().err().map(|e| e.marker().to_string()),
            duration_ms,
            timestamp: Utc::now(),
        });
        invocation
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        state: &mut SessionState,
        utterance: Utterance,
        reply: String,
        intent: Intent,
        recalled: Option<Vec<MemoryFact>>,
        tool: Option<ToolInvocation>,
        metadata: AssemblyMetadata,
    ) -> AgentResponse {
        let reply = reply.trim().to_string();
        state.transcript.push(utterance);
        state.transcript.push(Utterance::agent(reply.clone()));

        info!(session_id = %state.session_id, intent = ?intent, "Response generated");
        self.event_bus.publish(DomainEvent::ResponseGenerated {
            session_id: state.session_id.to_string(),
            intent: format!("{intent:?}"),
            timestamp: Utc::now(),
        });

        AgentResponse {
            text: reply,
            intent,
            recalled,
            tool,
            metadata,
        }
    }
}

/// Bound a recall by `deadline`; a store that never answers counts as unavailable.
pub(crate) async fn recall_within(
    deadline: Duration,
    recall: impl Future<Output = Result<Vec<MemoryFact>, MemoryError>>,
) -> Result<Vec<MemoryFact>, MemoryError> {
    tokio::time::timeout(deadline, recall)
        .await
        .unwrap_or_else(|_| Err(MemoryError::Unavailable(format!("no answer within {}s", deadline.as_secs()))))
}
