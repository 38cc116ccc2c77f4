//! Context assembly under a token budget.
//!
//! # Layers (in priority order)
//!
//! | Layer | Source | Trim Strategy |
//! |-------|--------|---------------|
//! | 1. Instructions | Persona prompts | Never trimmed |
//! | 2. Recalled memory | This turn's recall | Never trimmed |
//! | 3. Tool result | This turn's invocation | Never trimmed |
//! | 4. Current utterance | The user | Never trimmed |
//! | 5. Passive memory | Preloaded facts | Later facts dropped first |
//! | 6. Transcript | Earlier turns | Oldest turns dropped first |

pub mod assembler;
pub mod token;

pub use assembler::{
    render_tool_result, AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler, DropInfo,
    LayerStats, LAYER_PASSIVE, LAYER_TRANSCRIPT,
};
