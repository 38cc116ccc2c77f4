//! # Oracle Core
//!
//! Domain types, traits, and error definitions for the Oracle voice agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! Every collaborator of the turn orchestrator (model, memory store, tools,
//! transport) is a trait here. Implementations live in their own crates, so
//! tests can swap in scripted doubles.

pub mod error;
pub mod message;
pub mod provider;
pub mod transport;
pub mod tool;
pub mod schema;
pub mod memory;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{SessionId, Speaker, Transcript, Utterance};
pub use provider::{Decision, Intent, LanguageModel, ModelContext, ToolRequest};
pub use transport::Transport;
pub use tool::{Capability, Tool, ToolDefinition, ToolInvocation, ToolOutput, ToolRegistry, ToolSpec};
pub use memory::{CommitAck, CommitPayload, FactSource, MemoryFact, MemoryQuery, MemoryStore, UserId};
pub use event::{DomainEvent, EventBus};
