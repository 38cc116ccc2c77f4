//! Session lifecycle — `Idle → MemoryPreloaded → Active → Closing → Closed`.
//!
//! A [`SessionManager`] owns one user's conversation. Preloading passive
//! facts acquires the session; closing it flushes the transcript to the
//! memory store. The flush is best-effort with a single retry and runs
//! inside a bounded grace period. If the grace expires the commit task is
//! left running in the background rather than aborted.

use crate::orchestrator::{recall_within, SessionState, TurnOrchestrator};
use crate::prompts;
use chrono::{FixedOffset, Timelike, Utc};
use oracle_config::SessionConfig;
use oracle_core::error::SessionError;
use oracle_core::event::{DomainEvent, EventBus};
use oracle_core::memory::{CommitPayload, MemoryFact, MemoryQuery, MemoryStore, UserId};
use oracle_core::message::{Transcript, Utterance};
use oracle_core::provider::LanguageModel;
use oracle_core::tool::ToolRegistry;
use oracle_core::transport::Transport;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    MemoryPreloaded,
    Active,
    Closing,
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::MemoryPreloaded => "memory_preloaded",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What happened to the transcript when the session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing worth persisting was said.
    Skipped,
    Committed { stored: usize, attempts: u32 },
    Failed { attempts: u32, error: String },
    /// The grace period expired; the commit keeps running in the background.
    Detached,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Drives one user's session from preload to the final commit.
pub struct SessionManager {
    config: Arc<SessionConfig>,
    model: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryStore>,
    registry: Option<ToolRegistry>,
    orchestrator: Option<TurnOrchestrator>,
    state: SessionState,
    phase: SessionPhase,
    event_bus: Arc<EventBus>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        registry: ToolRegistry,
    ) -> Self {
        let state = SessionState::new(config.user_id.clone());
        Self {
            config: Arc::new(config),
            model,
            memory,
            registry: Some(registry),
            orchestrator: None,
            state,
            phase: SessionPhase::Idle,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Publish lifecycle and turn events on a shared bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.state.transcript
    }

    pub fn user_id(&self) -> &UserId {
        &self.state.user_id
    }

    /// `Idle → MemoryPreloaded`: load passive facts for the configured user.
    ///
    /// An unreachable or unresponsive store degrades to an empty fact set,
    /// bounded by the memory timeout. Returns the number of facts loaded.
    pub async fn preload(&mut self) -> oracle_core::Result<usize> {
        self.expect_phase("preload", SessionPhase::Idle)?;

        let user_id = self.state.user_id.clone();
        let query = MemoryQuery::new(&self.config.preload_query, self.config.preload_limit);
        let recall = self.memory.recall(&user_id, &query);
        let facts: Vec<MemoryFact> = match recall_within(self.config.memory_timeout, recall).await {
            Ok(facts) => facts.into_iter().filter(|f| f.user_id == user_id).collect(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Memory preload failed; starting with no known facts");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "memory_preload".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Vec::new()
            }
        };

        let count = facts.len();
        info!(user_id = %user_id, count, store = self.memory.name(), "Preloaded memories");
        self.state.passive_facts = facts;
        self.set_phase(SessionPhase::MemoryPreloaded);
        Ok(count)
    }

    /// `MemoryPreloaded → Active`: hand the tool registry to the turn loop.
    pub fn activate(&mut self) -> oracle_core::Result<()> {
        self.expect_phase("activate", SessionPhase::MemoryPreloaded)?;
        let registry = self.registry.take().ok_or(SessionError::RegistryConsumed)?;
        debug!(tools = ?registry.names(), "Registering tools");

        self.orchestrator = Some(TurnOrchestrator::new(
            self.model.clone(),
            self.memory.clone(),
            Arc::new(registry),
            self.config.clone(),
            self.event_bus.clone(),
        ));
        self.set_phase(SessionPhase::Active);
        Ok(())
    }

    /// Preload then activate.
    pub async fn start(&mut self) -> oracle_core::Result<()> {
        self.preload().await?;
        self.activate()
    }

    /// Generate and record the opening greeting.
    ///
    /// Falls back to a canned greeting when the model is unreachable.
    pub async fn greet(&mut self) -> oracle_core::Result<String> {
        let hour = self.local_hour();
        let orchestrator = match (&self.orchestrator, self.phase) {
            (Some(orchestrator), SessionPhase::Active) => orchestrator,
            _ => return Err(self.invalid_phase("greet")),
        };
        match orchestrator.greet(&mut self.state, hour).await {
            Ok(greeting) => Ok(greeting),
            Err(e) => {
                warn!(error = %e, "Greeting generation failed; using a canned greeting");
                let greeting = prompts::greeting(&self.config.persona, hour, self.state.transcript.len());
                self.state.transcript.push(Utterance::agent(greeting.clone()));
                Ok(greeting)
            }
        }
    }

    /// Run one turn and return the text to speak.
    ///
    /// A model outage does not end the session: the user's utterance is
    /// recorded with an apology and the session stays active.
    pub async fn handle(&mut self, text: &str) -> oracle_core::Result<String> {
        let orchestrator = match (&self.orchestrator, self.phase) {
            (Some(orchestrator), SessionPhase::Active) => orchestrator,
            _ => return Err(self.invalid_phase("handle")),
        };
        match orchestrator.handle_turn(text, &mut self.state).await {
            Ok(response) => Ok(response.text),
            Err(e) => {
                error!(session_id = %self.state.session_id, error = %e, "Turn failed");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "turn".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                let reply = format!(
                    "My apologies, {}. I can't reach my thoughts right now. Please try again in a moment.",
                    self.config.persona.honorific
                );
                self.state.transcript.push(Utterance::user(text.trim()));
                self.state.transcript.push(Utterance::agent(reply.clone()));
                Ok(reply)
            }
        }
    }

    /// `→ Closing → Closed`: flush the transcript.
    ///
    /// Never fails because of the memory store; the outcome says what
    /// happened. Closing an already closed session is an error.
    pub async fn close(&mut self) -> oracle_core::Result<CommitOutcome> {
        if matches!(self.phase, SessionPhase::Closing | SessionPhase::Closed) {
            return Err(self.invalid_phase("close"));
        }
        let acquired = self.phase != SessionPhase::Idle;
        self.set_phase(SessionPhase::Closing);
        self.orchestrator = None;

        let outcome = if acquired {
            self.flush().await
        } else {
            CommitOutcome::Skipped
        };

        self.set_phase(SessionPhase::Closed);
        Ok(outcome)
    }

    /// Serve a transport until it disconnects or `shutdown` resolves, then
    /// say goodbye and close.
    ///
    /// Turns are strictly sequential: a shutdown signal that arrives
    /// mid-turn takes effect once the turn has been answered.
    pub async fn run<T, F>(&mut self, transport: &T, shutdown: F) -> oracle_core::Result<CommitOutcome>
    where
        T: Transport + ?Sized,
        F: Future<Output = ()>,
    {
        if self.phase == SessionPhase::Idle {
            self.start().await?;
        }
        let mut inbound = transport.start().await?;
        info!(transport = transport.name(), user_id = %self.state.user_id, "Session started");

        if self.config.greet_on_start {
            let greeting = self.greet().await?;
            if let Err(e) = transport.send(&greeting).await {
                warn!(error = %e, "Failed to deliver greeting");
            }
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                received = inbound.recv() => match received {
                    Some(Ok(text)) => {
                        if text.trim().is_empty() {
                            continue;
                        }
                        let reply = self.handle(&text).await?;
                        if let Err(e) = transport.send(&reply).await {
                            warn!(error = %e, "Failed to deliver reply");
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Transport error; ending session");
                        break;
                    }
                    None => {
                        info!("Transport disconnected");
                        break;
                    }
                },
            }
        }

        let farewell = prompts::farewell(&self.config.persona, self.state.transcript.len());
        if let Err(e) = transport.send(&farewell).await {
            debug!(error = %e, "Farewell not delivered");
        }
        self.close().await
    }

    async fn flush(&mut self) -> CommitOutcome {
        let utterances = spoken(&self.state.transcript);
        if utterances.is_empty() {
            info!(user_id = %self.state.user_id, "Nothing said; skipping memory commit");
            return CommitOutcome::Skipped;
        }

        let grace = self.config.commit_grace;
        let mut task = tokio::spawn(commit_with_retry(
            self.memory.clone(),
            self.state.user_id.clone(),
            utterances,
            self.config.retry_on_commit_failure,
            self.event_bus.clone(),
        ));

        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "Memory commit task panicked");
                CommitOutcome::Failed {
                    attempts: 0,
                    error: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    grace_secs = grace.as_secs(),
                    "Memory commit still running after the grace period; leaving it in the background"
                );
                CommitOutcome::Detached
            }
        }
    }


    fn expect_phase(&self, operation: &str, expected: SessionPhase) -> oracle_core::Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(self.invalid_phase(operation))
        }
    }

    fn invalid_phase(&self, operation: &str) -> oracle_core::Error {
        SessionError::InvalidPhase {
            operation: operation.into(),
            phase: self.phase.to_string(),
        }
        .into()
    }

    fn set_phase(&mut self, to: SessionPhase) {
        let from = self.phase;
        self.phase = to;
        debug!(session_id = %self.state.session_id, %from, %to, "Session phase changed");
        self.event_bus.publish(DomainEvent::SessionPhaseChanged {
            session_id: self.state.session_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn local_hour(&self) -> u32 {
        let now = Utc::now();
        self.config
            .persona
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| now.with_timezone(&offset).hour())
            .unwrap_or_else(|| now.hour())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if matches!(self.phase, SessionPhase::Idle | SessionPhase::Closing | SessionPhase::Closed) {
            return;
        }
        let utterances = spoken(&self.state.transcript);
        if utterances.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    user_id = %self.state.user_id,
                    utterances = utterances.len(),
                    "Session dropped without closing; committing transcript in the background"
                );
                handle.spawn(commit_with_retry(
                    self.memory.clone(),
                    self.state.user_id.clone(),
                    utterances,
                    self.config.retry_on_commit_failure,
                    self.event_bus.clone(),
                ));
            }
            Err(_) => {
                warn!(
                    user_id = %self.state.user_id,
                    "Session dropped outside a runtime; transcript not committed"
                );
            }
        }
    }
}

/// Utterances with something in them.
fn spoken(transcript: &Transcript) -> Vec<Utterance> {
    transcript
        .utterances()
        .iter()
        .filter(|u| !u.text().trim().is_empty())
        .cloned()
        .collect()
}

/// Commit a transcript, retrying once on failure when `retry` is set.
async fn commit_with_retry(
    memory: Arc<dyn MemoryStore>,
    user_id: UserId,
    utterances: Vec<Utterance>,
    retry: bool,
    event_bus: Arc<EventBus>,
) -> CommitOutcome {
    let max_attempts: u32 = if retry { 2 } else { 1 };
    let count = utterances.len();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = memory
            .commit(&user_id, CommitPayload::Transcript(utterances.clone()))
            .await;

        let outcome = match result {
            Ok(ack) => {
                info!(user_id = %user_id, utterances = count, stored = ack.stored, attempts, "Transcript committed");
                CommitOutcome::Committed {
                    stored: ack.stored,
                    attempts,
                }
            }
            Err(e) if attempts < max_attempts => {
                warn!(user_id = %user_id, error = %e, attempts, "Transcript commit failed; retrying");
                continue;
            }
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    attempts,
                    "Transcript commit failed; this session will not be remembered"
                );
                CommitOutcome::Failed {
                    attempts,
                    error: e.to_string(),
                }
            }
        };

        event_bus.publish(DomainEvent::MemoryCommitted {
            user_id: user_id.to_string(),
            utterances: count,
            attempts,
            success: outcome.is_committed(),
            timestamp: Utc::now(),
        });
        return outcome;
    }
}
