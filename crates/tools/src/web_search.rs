//! Web search tool — DuckDuckGo instant-answer API.
//!
//! The instant-answer endpoint needs no key and returns an abstract, a
//! direct answer, and related topics; those are flattened into a short list
//! the model can read aloud.

use async_trait::async_trait;
use oracle_core::error::ToolError;
use oracle_core::tool::{Capability, Tool, ToolOutput};
use serde::Deserialize;
use std::time::Duration;

const TOOL_NAME: &str = "search_web";
const MAX_SNIPPETS: usize = 5;

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: "https://api.duckduckgo.com/".into(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    abstract_text: String,
    #[serde(default)]
    abstract_source: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    definition: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
    Other(serde::de::IgnoredAny),
}

fn collect_topics(topics: &[RelatedTopic], out: &mut Vec<String>) {
    for topic in topics {
        if out.len() >= MAX_SNIPPETS {
            return;
        }
        match topic {
            RelatedTopic::Topic { text } if !text.trim().is_empty() => out.push(text.trim().to_string()),
            RelatedTopic::Topic { .. } | RelatedTopic::Other(_) => {}
            RelatedTopic::Group { topics } => collect_topics(topics, out),
        }
    }
}

/// Flatten an instant-answer body into snippets, most direct first.
pub(crate) fn parse_instant_answer(body: &str) -> Result<Vec<String>, String> {
    let parsed: InstantAnswer =
        serde_json::from_str(body).map_err(|e| format!("invalid search response: {e}"))?;

    let mut snippets = Vec::new();
    if !parsed.answer.trim().is_empty() {
        snippets.push(parsed.answer.trim().to_string());
    }
    if !parsed.abstract_text.trim().is_empty() {
        let text = parsed.abstract_text.trim();
        if parsed.abstract_source.is_empty() {
            snippets.push(text.to_string());
        } else {
            snippets.push(format!("{text} ({})", parsed.abstract_source));
        }
    }
    if !parsed.definition.trim().is_empty() {
        snippets.push(parsed.definition.trim().to_string());
    }
    collect_topics(&parsed.related_topics, &mut snippets);
    snippets.truncate(MAX_SNIPPETS);
    Ok(snippets)
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns a few short snippets."
    }

    fn capability(&self) -> Capability {
        Capability::Search
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query",
                    "minLength": 1
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .ok_or_else(|| ToolError::invalid(TOOL_NAME, "missing 'query'"))?;

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("no_html", "1"), ("skip_disambig", "1")])
            .timeout(Duration::from_secs(8))
            .send()
            .await
            .map_err(|e| ToolError::failed(TOOL_NAME, format!("search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ToolError::failed(
                TOOL_NAME,
                format!("search returned status {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::failed(TOOL_NAME, format!("failed to read search response: {e}")))?;
        let snippets = parse_instant_answer(&body).map_err(|e| ToolError::failed(TOOL_NAME, e))?;

        if snippets.is_empty() {
            return Ok(ToolOutput::text(format!("No results found for \"{query}\".")));
        }
        let output = snippets
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ToolOutput {
            output,
            data: Some(serde_json::json!({ "query": query, "results": snippets })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_abstract_and_topics() {
        let body = r#"{
            "AbstractText": "Rust is a multi-paradigm programming language.",
            "AbstractSource": "Wikipedia",
            "Answer": "",
            "RelatedTopics": [
                {"Text": "Cargo - the Rust package manager", "FirstURL": "https://example.org"},
                {"Name": "See also", "Topics": [{"Text": "Ferris - the mascot"}]}
            ]
        }"#;
        let snippets = parse_instant_answer(body).unwrap();
        assert_eq!(snippets.len(), 3);
        assert_eq!(snippets[0], "Rust is a multi-paradigm programming language. (Wikipedia)");
        assert_eq!(snippets[2], "Ferris - the mascot");
    }

    #[test]
    fn direct_answer_comes_first() {
        let body = r#"{"Answer": "42", "AbstractText": "Some abstract"}"#;
        let snippets = parse_instant_answer(body).unwrap();
        assert_eq!(snippets[0], "42");
    }

    #[test]
    fn caps_snippet_count() {
        let topics: Vec<_> = (0..20).map(|i| serde_json::json!({"Text": format!("topic {i}")})).collect();
        let body = serde_json::json!({"RelatedTopics": topics}).to_string();
        assert_eq!(parse_instant_answer(&body).unwrap().len(), MAX_SNIPPETS);
    }

    #[test]
    fn empty_response_has_no_snippets() {
        assert!(parse_instant_answer("{}").unwrap().is_empty());
        assert!(parse_instant_answer("not json").is_err());
    }
}
