//! Keyword relevance ranking shared by the local stores.
//!
//! Scoring is a plain term-overlap count: each distinct query term that
//! appears as (a prefix of) a word in the fact scores one point. Ties break
//! on recency, then content, so ranking is fully deterministic.

use oracle_core::memory::{FactSource, MemoryFact, UserId};
use oracle_core::message::Utterance;

const STOP_WORDS: &[&str] = &[
    "a", "am", "an", "and", "are", "as", "at", "be", "can", "did", "do", "does", "for", "from",
    "have", "how", "in", "is", "it", "me", "my", "of", "on", "or", "so", "that", "the", "this",
    "to", "was", "what", "when", "where", "which", "who", "why", "with", "you", "your",
];

/// Lowercased, de-duplicated query terms with stop words removed.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in words(text) {
        if word.len() < 2 || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

const SPEAKER_LABELS: &[&str] = &["user: ", "assistant: "];

/// `content` without the speaker label transcript facts carry.
fn spoken_text(content: &str) -> &str {
    SPEAKER_LABELS
        .iter()
        .find_map(|label| content.strip_prefix(label))
        .unwrap_or(content)
}

/// Number of query terms found in `content`.
pub fn score(content: &str, terms: &[String]) -> usize {
    let content_words: Vec<String> = words(content).collect();
    terms
        .iter()
        .filter(|term| content_words.iter().any(|w| w.starts_with(term.as_str())))
        .count()
}

/// Rank `facts` (already scoped to one user) against `query`.
///
/// A query with no usable terms returns the most recent facts.
pub fn rank<'a>(facts: impl Iterator<Item = &'a MemoryFact>, query: &str, limit: usize) -> Vec<MemoryFact> {
    let terms = query_terms(query);
    let mut scored: Vec<(usize, &MemoryFact)> = if terms.is_empty() {
        facts.map(|f| (0, f)).collect()
    } else {
        facts
            .map(|f| (score(spoken_text(&f.content), &terms), f))
            .filter(|(s, _)| *s > 0)
            .collect()
    };

    scored.sort_by(|(sa, a), (sb, b)| {
        sb.cmp(sa)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.content.cmp(&b.content))
    });

    scored.into_iter().take(limit).map(|(_, f)| f.clone()).collect()
}

/// Turn a transcript into passive facts, one per non-blank utterance.
pub fn transcript_facts(user_id: &UserId, utterances: &[Utterance]) -> Vec<MemoryFact> {
    utterances
        .iter()
        .filter(|u| !u.text().trim().is_empty())
        .map(|u| MemoryFact {
            user_id: user_id.clone(),
            content: format!("{}: {}", u.speaker().role(), u.text().trim()),
            source: FactSource::Passive,
            created_at: u.timestamp(),
        })
        .collect()
}

/// Turn explicit fact strings into active facts.
pub fn explicit_facts(user_id: &UserId, contents: &[String]) -> Vec<MemoryFact> {
    contents
        .iter()
        .filter(|c| !c.trim().is_empty())
        .map(|c| MemoryFact::new(user_id.clone(), c.trim(), FactSource::Active))
        .collect()
}
