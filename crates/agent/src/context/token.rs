//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Close enough
//! for budget enforcement across BPE and SentencePiece tokenizers on
//! conversational English.

use oracle_core::message::Utterance;

/// Per-message overhead for role names and delimiters in the wire format.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for one utterance including per-message overhead.
pub fn estimate_utterance_tokens(utterance: &Utterance) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(utterance.text())
}

/// Estimate tokens for a run of utterances.
pub fn estimate_utterances_tokens(utterances: &[Utterance]) -> usize {
    utterances.iter().map(estimate_utterance_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn utterance_includes_overhead() {
        assert_eq!(estimate_utterance_tokens(&Utterance::user("test")), 5);
    }

    #[test]
    fn multiple_utterances() {
        let turns = vec![Utterance::user("hello"), Utterance::agent("world!!")];
        // (2 + 4) + (2 + 4)
        assert_eq!(estimate_utterances_tokens(&turns), 12);
    }
}
