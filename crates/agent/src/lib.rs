//! The voice agent's turn loop.
//!
//! Every utterance follows a **Decide → Gather → Answer** cycle:
//!
//! 1. **Receive** an utterance from the transport
//! 2. **Decide** with the model whether it needs memory, a tool, both or neither
//! 3. **Gather** recalled facts and tool output, concurrently
//! 4. **Answer** from a context assembled within the token budget
//! 5. **Record** both sides of the exchange in the transcript
//!
//! A [`SessionManager`] wraps turns in the session lifecycle: passive
//! memory preload at the start, a best-effort transcript commit at the end.

pub mod context;
pub mod orchestrator;
pub mod prompts;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{
    AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler, DropInfo, LayerStats,
};
pub use orchestrator::{AgentResponse, SessionState, TurnOrchestrator};
pub use session::{CommitOutcome, SessionManager, SessionPhase};
