//! Context assembly — builds the model-facing context for one model call.
//!
//! The system message is built from four sections, in order:
//!
//! 1. **Instructions** (persona, rules): never trimmed
//! 2. **Passive memory** (facts preloaded at session start): last facts dropped first
//! 3. **Recalled memory** (this turn's recall): never trimmed
//! 4. **Tool result** (this turn's invocation, or its error marker): never trimmed
//!
//! followed by the turn list: the transcript tail (oldest dropped first)
//! and the current utterance (never trimmed).
//!
//! # Budget
//!
//! Everything that belongs to the current turn is reserved first. Passive
//! facts fill what remains, then the transcript tail fills from newest to
//! oldest. If the reserved part alone exceeds the budget, nothing of the
//! current turn is dropped; the overflow is reported in the metadata.
//!
//! # Determinism
//!
//! Identical inputs always produce identical outputs. Nothing here reads a
//! clock or a random source.

use crate::context::token;
use oracle_core::memory::{render_recall, MemoryFact};
use oracle_core::message::Utterance;
use oracle_core::provider::ModelContext;
use oracle_core::tool::ToolInvocation;
use serde::{Deserialize, Serialize};

// ── Types ─────────────────────────────────────────────────────────────────

/// All inputs required by the assembler for a single model call.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    /// Persona and rules.
    pub instructions: &'a str,
    /// Facts preloaded at session start, most relevant first.
    pub passive_facts: &'a [MemoryFact],
    /// This turn's recall. `Some(&[])` renders as "no relevant memory".
    pub recalled: Option<&'a [MemoryFact]>,
    /// This turn's tool invocation, successful or not.
    pub tool_result: Option<&'a ToolInvocation>,
    /// Session transcript, oldest first.
    pub transcript: &'a [Utterance],
    /// The utterance being answered.
    pub current: Option<&'a Utterance>,
}

impl<'a> AssemblyInput<'a> {
    /// An input with only instructions and the conversation.
    pub fn conversation(
        instructions: &'a str,
        transcript: &'a [Utterance],
        current: Option<&'a Utterance>,
    ) -> Self {
        Self {
            instructions,
            passive_facts: &[],
            recalled: None,
            tool_result: None,
            transcript,
            current,
        }
    }
}

/// The assembled context, ready for a model call.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub context: ModelContext,
    pub metadata: AssemblyMetadata,
}

/// Detailed metadata about the assembly process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Total tokens in the assembled context.
    pub total_tokens: usize,
    /// Configured token budget.
    pub budget: usize,
    /// Budget utilization percentage.
    pub utilization_pct: f32,
    /// Per-section statistics.
    pub per_layer: Vec<LayerStats>,
    /// Items dropped from each section.
    pub drops: Vec<DropInfo>,
    /// Tokens the current turn needs when it alone exceeds the budget.
    pub overflow: Option<usize>,
}

impl AssemblyMetadata {
    pub fn dropped_from(&self, layer: &str) -> usize {
        self.drops
            .iter()
            .filter(|d| d.layer == layer)
            .map(|d| d.items_dropped)
            .sum()
    }
}

/// Statistics for a single context section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStats {
    pub name: String,
    pub tokens: usize,
    pub items_included: usize,
    pub items_total: usize,
}

/// Information about items dropped from a section during budget enforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropInfo {
    pub layer: String,
    pub items_dropped: usize,
    pub tokens_dropped: usize,
    pub reason: String,
}

pub const LAYER_PASSIVE: &str = "passive_memory";
pub const LAYER_TRANSCRIPT: &str = "transcript";

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless; create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    budget: usize,
    facts_heading: String,
}

impl ContextAssembler {
    pub fn new(max_context_tokens: usize) -> Self {
        Self {
            budget: max_context_tokens,
            facts_heading: "KNOWN FACTS ABOUT THE USER".into(),
        }
    }

    /// Heading for the passive-memory section (e.g. "KNOWN FACTS ABOUT MR. WAYNE").
    pub fn with_facts_heading(mut self, heading: impl Into<String>) -> Self {
        self.facts_heading = heading.into();
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Assemble one model context.
    pub fn build(&self, input: &AssemblyInput<'_>) -> AssembledContext {
        let mut stats: Vec<LayerStats> = Vec::new();
        let mut drops: Vec<DropInfo> = Vec::new();

        // ── Reserved: everything belonging to the current turn ─────────────
        let system_tokens = token::estimate_tokens(input.instructions);
        stats.push(Self::whole("system", system_tokens));

        let recall_section = input
            .recalled
            .map(|facts| format!("# RECALLED MEMORY\n{}", render_recall(facts)));
        let recall_tokens = Self::section_tokens(recall_section.as_deref());
        if let Some(facts) = input.recalled {
            stats.push(LayerStats {
                name: "recalled_memory".into(),
                tokens: recall_tokens,
                items_included: facts.len(),
                items_total: facts.len(),
            });
        }

        let tool_section = input.tool_result.map(render_tool_result);
        let tool_tokens = Self::section_tokens(tool_section.as_deref());
        if tool_section.is_some() {
            stats.push(Self::whole("tool_result", tool_tokens));
        }

        let current_tokens = input.current.map(token::estimate_utterance_tokens).unwrap_or(0);

        let reserved = system_tokens + recall_tokens + tool_tokens + current_tokens;
        let overflow = (reserved > self.budget).then_some(reserved);
        let mut remaining = self.budget.saturating_sub(reserved);

        // ── Passive memory ─────────────────────────────────────────────────
        let (passive_section, passive_stats, passive_drop) =
            self.render_passive_layer(input.passive_facts, remaining);
        remaining -= passive_stats.tokens;
        stats.push(passive_stats);
        drops.extend(passive_drop);

        // ── Transcript tail ────────────────────────────────────────────────
        let (mut turns, hist_stats, hist_drop) = Self::render_transcript_layer(input.transcript, remaining);
        stats.push(hist_stats);
        drops.extend(hist_drop);

        if let Some(current) = input.current {
            turns.push(current.clone());
            stats.push(Self::whole("current_utterance", current_tokens));
        }

        // ── System message ─────────────────────────────────────────────────
        let sections: Vec<&str> = [
            Some(input.instructions),
            passive_section.as_deref(),
            recall_section.as_deref(),
            tool_section.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
        let system = sections.join("\n\n");

        let total_tokens: usize = stats.iter().map(|s| s.tokens).sum();
        let utilization_pct = if self.budget == 0 {
            100.0
        } else {
            (total_tokens as f32 / self.budget as f32) * 100.0
        };

        AssembledContext {
            context: ModelContext { system, turns },
            metadata: AssemblyMetadata {
                total_tokens,
                budget: self.budget,
                utilization_pct,
                per_layer: stats,
                drops,
                overflow,
            },
        }
    }

    // ── Private section renderers ─────────────────────────────────────────

    fn render_passive_layer(
        &self,
        facts: &[MemoryFact],
        budget: usize,
    ) -> (Option<String>, LayerStats, Option<DropInfo>) {
        let layer = LAYER_PASSIVE;
        if facts.is_empty() {
            return (None, Self::empty_stats(layer, 0), None);
        }

        let header = format!(
            "# {}\n(Verified memory from previous conversations. Treat it as ground truth.)\n",
            self.facts_heading
        );
        // +1 for the blank line separating sections
        let header_tokens = token::estimate_tokens(&header) + 1;
        if header_tokens >= budget {
            let dropped_tokens: usize = facts
                .iter()
                .map(|f| token::estimate_tokens(&f.content) + 1)
                .sum();
            return (
                None,
                Self::empty_stats(layer, facts.len()),
                Some(DropInfo {
                    layer: layer.into(),
                    items_dropped: facts.len(),
                    tokens_dropped: dropped_tokens,
                    reason: "No budget available for passive memory".into(),
                }),
            );
        }

        let mut used = header_tokens;
        let mut lines = Vec::new();
        let mut dropped = 0;
        let mut dropped_tokens = 0;

        for fact in facts {
            let line = format!("- {}\n", fact.content.trim());
            let line_tokens = token::estimate_tokens(&line);
            if dropped == 0 && used + line_tokens <= budget {
                lines.push(line);
                used += line_tokens;
            } else {
                // Once one fact is dropped, every later fact is dropped too.
                dropped += 1;
                dropped_tokens += line_tokens;
            }
        }

        let section = if lines.is_empty() {
            used = 0;
            None
        } else {
            Some(format!("{}{}", header, lines.concat()).trim_end().to_string())
        };

        (
            section,
            LayerStats {
                name: layer.into(),
                tokens: used,
                items_included: lines.len(),
                items_total: facts.len(),
            },
            Self::maybe_drop(layer, dropped, dropped_tokens, "Least relevant facts dropped"),
        )
    }

    fn render_transcript_layer(
        transcript: &[Utterance],
        budget: usize,
    ) -> (Vec<Utterance>, LayerStats, Option<DropInfo>) {
        let layer = LAYER_TRANSCRIPT;
        if transcript.is_empty() {
            return (Vec::new(), Self::empty_stats(layer, 0), None);
        }

        let mut used = 0;
        let mut included = Vec::new();
        let mut dropped = 0;
        let mut dropped_tokens = 0;

        // Sliding window: include from newest (end) → oldest. The first
        // utterance that does not fit closes the window.
        for utterance in transcript.iter().rev() {
            let tokens = token::estimate_utterance_tokens(utterance);
            if dropped == 0 && used + tokens <= budget {
                included.push(utterance.clone());
                used += tokens;
            } else {
                dropped += 1;
                dropped_tokens += tokens;
            }
        }
        included.reverse();

        let count = included.len();
        (
            included,
            LayerStats {
                name: layer.into(),
                tokens: used,
                items_included: count,
                items_total: transcript.len(),
            },
            Self::maybe_drop(layer, dropped, dropped_tokens, "Oldest utterances dropped"),
        )
    }

    fn section_tokens(section: Option<&str>) -> usize {
        section.map(|s| token::estimate_tokens(s) + 1).unwrap_or(0)
    }

    fn whole(name: &str, tokens: usize) -> LayerStats {
        LayerStats {
            name: name.into(),
            tokens,
            items_included: 1,
            items_total: 1,
        }
    }

    fn empty_stats(name: &str, total: usize) -> LayerStats {
        LayerStats {
            name: name.into(),
            tokens: 0,
            items_included: 0,
            items_total: total,
        }
    }

    fn maybe_drop(layer: &str, count: usize, tokens: usize, reason: &str) -> Option<DropInfo> {
        if count > 0 {
            Some(DropInfo {
                layer: layer.into(),
                items_dropped: count,
                tokens_dropped: tokens,
                reason: reason.into(),
            })
        } else {
            None
        }
    }
}

/// Render a tool invocation for the model: its output, or a structured
/// error marker plus how to talk about the failure.
pub fn render_tool_result(invocation: &ToolInvocation) -> String {
    let heading = format!("# TOOL RESULT: {}", invocation.tool_name);
    match &invocation.outcome {
        Ok(output) => format!("{heading}\n{}", output.output.trim()),
        Err(err) => {
            let guidance = match err.marker() {
                "tool_not_found" => "That capability is not available. Say so briefly.",
                "invalid_tool_arguments" => {
                    "The request was missing details or had invalid ones. Ask the user one short clarifying question."
                }
                _ => "The tool did not return a result. Tell the user briefly that it is unavailable right now. Never make up a result.",
            };
            format!("{heading}\n[error: {}] {err}\n{guidance}", err.marker())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_core::error::ToolError;
    use oracle_core::memory::{FactSource, UserId};
    use oracle_core::tool::ToolOutput;
    use std::time::Duration;

    fn fact(content: &str) -> MemoryFact {
        MemoryFact::new(UserId::new("alice"), content, FactSource::Passive)
    }

    fn invocation(outcome: Result<ToolOutput, ToolError>) -> ToolInvocation {
        ToolInvocation {
            tool_name: "get_weather".into(),
            arguments: serde_json::json!({}),
            outcome,
            duration: Duration::from_millis(5),
        }
    }

    fn transcript(n: usize) -> Vec<Utterance> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Utterance::user(format!("user message number {i} with some padding text"))
                } else {
                    Utterance::agent(format!("agent reply number {i} with some padding text"))
                }
            })
            .collect()
    }

    #[test]
    fn sections_are_ordered() {
        let passive = vec![fact("likes tea")];
        let recalled = vec![fact("name is Alice")];
        let inv = invocation(Ok(ToolOutput::text("Gotham: Clear | Temp 21°C")));
        let current = Utterance::user("What's the weather?");
        let history = transcript(2);

        let out = ContextAssembler::new(4096).build(&AssemblyInput {
            instructions: "You are Oracle.",
            passive_facts: &passive,
            recalled: Some(&recalled),
            tool_result: Some(&inv),
            transcript: &history,
            current: Some(&current),
        });

        let sys = &out.context.system;
        let i_instr = sys.find("You are Oracle.").unwrap();
        let i_passive = sys.find("likes tea").unwrap();
        let i_recall = sys.find("name is Alice").unwrap();
        let i_tool = sys.find("Temp 21°C").unwrap();
        assert!(i_instr < i_passive && i_passive < i_recall && i_recall < i_tool);

        assert_eq!(out.context.turns.len(), 3);
        assert_eq!(out.context.turns.last().unwrap().text(), "What's the weather?");
        assert!(out.metadata.overflow.is_none());
    }

    #[test]
    fn assembly_is_deterministic() {
        let passive = vec![fact("likes tea"), fact("lives in Gotham")];
        let history = transcript(6);
        let current = Utterance::user("hello");
        let input = AssemblyInput {
            instructions: "You are Oracle.",
            passive_facts: &passive,
            recalled: None,
            tool_result: None,
            transcript: &history,
            current: Some(&current),
        };
        let assembler = ContextAssembler::new(100);
        let a = assembler.build(&input);
        let b = assembler.build(&input);
        assert_eq!(a.context, b.context);
        assert_eq!(a.metadata, b.metadata);
    }

    #[test]
    fn over_budget_drops_oldest_transcript_and_keeps_injections() {
        let history = transcript(20);
        let recalled = vec![fact("name is Alice")];
        let inv = invocation(Ok(ToolOutput::text("Temp 21°C")));
        let current = Utterance::user("and tomorrow?");

        let out = ContextAssembler::new(120).build(&AssemblyInput {
            instructions: "You are Oracle.",
            passive_facts: &[],
            recalled: Some(&recalled),
            tool_result: Some(&inv),
            transcript: &history,
            current: Some(&current),
        });

        assert!(out.context.system.contains("name is Alice"));
        assert!(out.context.system.contains("Temp 21°C"));
        assert_eq!(out.context.turns.last().unwrap().text(), "and tomorrow?");

        let kept = &out.context.turns[..out.context.turns.len() - 1];
        assert!(kept.len() < history.len());
        // The kept window is the newest contiguous suffix.
        assert_eq!(kept, &history[history.len() - kept.len()..]);
        assert_eq!(out.metadata.dropped_from(LAYER_TRANSCRIPT), history.len() - kept.len());
        assert!(out.metadata.total_tokens <= 120);
    }

    #[test]
    fn passive_facts_trimmed_only_after_transcript() {
        let passive: Vec<_> = (0..30).map(|i| fact(&format!("passive fact number {i} about the user"))).collect();
        let history = transcript(4);
        let current = Utterance::user("hi");

        let out = ContextAssembler::new(150).build(&AssemblyInput {
            instructions: "You are Oracle.",
            passive_facts: &passive,
            recalled: None,
            tool_result: None,
            transcript: &history,
            current: Some(&current),
        });

        assert_eq!(out.context.turns.len(), 1, "transcript fully dropped");
        assert!(out.metadata.dropped_from(LAYER_PASSIVE) > 0);
        assert!(out.context.system.contains("passive fact number 0 "));
        assert!(!out.context.system.contains("passive fact number 29 "));
    }

    #[test]
    fn overflow_is_reported_not_resolved_by_dropping_evidence() {
        let big = "x".repeat(2000);
        let inv = invocation(Ok(ToolOutput::text(big.clone())));
        let current = Utterance::user("summarise");

        let out = ContextAssembler::new(64).build(&AssemblyInput {
            instructions: "You are Oracle.",
            passive_facts: &[fact("likes tea")],
            recalled: None,
            tool_result: Some(&inv),
            transcript: &transcript(3),
            current: Some(&current),
        });

        assert!(out.context.system.contains(&big));
        assert!(out.metadata.overflow.unwrap() > 64);
        assert_eq!(out.context.turns.len(), 1);
    }

    #[test]
    fn failed_tool_renders_marker() {
        let inv = invocation(Err(ToolError::Timeout {
            tool_name: "get_weather".into(),
            timeout_secs: 10,
        }));
        let text = render_tool_result(&inv);
        assert!(text.starts_with("# TOOL RESULT: get_weather"));
        assert!(text.contains("[error: tool_timeout]"));
        assert!(text.contains("Never make up a result"));
    }

    #[test]
    fn empty_recall_renders_no_memory_line() {
        let current = Utterance::user("What's my name?");
        let out = ContextAssembler::new(4096).build(&AssemblyInput {
            recalled: Some(&[]),
            ..AssemblyInput::conversation("You are Oracle.", &[], Some(&current))
        });
        assert!(out.context.system.contains("No relevant memory found."));
    }

    #[test]
    fn facts_heading_is_configurable() {
        let passive = vec![fact("likes tea")];
        let out = ContextAssembler::new(4096)
            .with_facts_heading("KNOWN FACTS ABOUT MR. WAYNE")
            .build(&AssemblyInput {
                passive_facts: &passive,
                ..AssemblyInput::conversation("You are Oracle.", &[], None)
            });
        assert!(out.context.system.contains("# KNOWN FACTS ABOUT MR. WAYNE"));
        assert!(out.context.turns.is_empty());
    }
}
