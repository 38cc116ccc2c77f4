//! mem0 remote store — hosted memory service over HTTP.
//!
//! Recall uses the v2 search endpoint with a `user_id` filter; commit posts the
//! transcript (or explicit facts) as messages and lets the service infer
//! what to keep.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oracle_core::error::MemoryError;
use oracle_core::memory::{CommitAck, CommitPayload, FactSource, MemoryFact, MemoryQuery, MemoryStore, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// A memory store backed by the mem0 HTTP API.
pub struct Mem0Store {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl Mem0Store {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Bound every request (connect, send and body) by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.api_key)
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn request_failed(e: reqwest::Error) -> MemoryError {
    if e.is_timeout() {
        MemoryError::Unavailable(format!("mem0 did not answer in time: {e}"))
    } else {
        MemoryError::Unavailable(format!("mem0 request failed: {e}"))
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    filters: SearchFilters<'a>,
    limit: usize,
}

#[derive(Debug, Serialize)]
struct SearchFilters<'a> {
    user_id: &'a str,
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    messages: Vec<AddMessage>,
    user_id: &'a str,
    infer: bool,
}

#[derive(Debug, Serialize)]
struct AddMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct RemoteMemory {
    memory: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    List(Vec<RemoteMemory>),
    Wrapped { results: Vec<RemoteMemory> },
}

/// Parse a search response body, dropping anything tagged with another owner.
pub(crate) fn parse_search_response(body: &str, user_id: &UserId) -> Result<Vec<MemoryFact>, MemoryError> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|e| MemoryError::Unavailable(format!("Invalid mem0 search response: {e}")))?;
    let items = match parsed {
        SearchResponse::List(items) => items,
        SearchResponse::Wrapped { results } => results,
    };

    let mut facts = Vec::with_capacity(items.len());
    for item in items {
        if let Some(owner) = &item.user_id {
            if owner != user_id.as_str() {
                warn!(expected = %user_id, got = %owner, "Dropping mem0 result owned by another user");
                continue;
            }
        }
        facts.push(MemoryFact {
            user_id: user_id.clone(),
            content: item.memory,
            source: FactSource::Passive,
            created_at: item.created_at.unwrap_or_else(Utc::now),
        });
    }
    Ok(facts)
}

fn commit_messages(payload: &CommitPayload) -> Vec<AddMessage> {
    match payload {
        CommitPayload::Facts(contents) => contents
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| AddMessage { role: "user".into(), content: c.trim().to_string() })
            .collect(),
        CommitPayload::Transcript(utterances) => utterances
            .iter()
            .filter(|u| !u.text().trim().is_empty())
            .map(|u| AddMessage {
                role: u.speaker().role().to_string(),
                content: u.text().trim().to_string(),
            })
            .collect(),
    }
}

#[async_trait]
impl MemoryStore for Mem0Store {
    fn name(&self) -> &str {
        "mem0"
    }

    async fn recall(&self, user_id: &UserId, query: &MemoryQuery) -> Result<Vec<MemoryFact>, MemoryError> {
        let body = SearchRequest {
            query: &query.text,
            filters: SearchFilters { user_id: user_id.as_str() },
            limit: query.limit,
        };

        let response = self
            .client
            .post(format!("{}/v2/memories/search/", self.api_url))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(request_failed)?;
        if !status.is_success() {
            return Err(MemoryError::Unavailable(format!("mem0 search returned {status}: {text}")));
        }

        let mut facts = parse_search_response(&text, user_id)?;
        facts.truncate(query.limit);
        debug!(user_id = %user_id, count = facts.len(), "mem0 recall");
        Ok(facts)
    }

    async fn commit(&self, user_id: &UserId, payload: CommitPayload) -> Result<CommitAck, MemoryError> {
        let messages = commit_messages(&payload);
        if messages.is_empty() {
            return Ok(CommitAck { stored: 0 });
        }
        let stored = messages.len();
        let body = AddRequest { messages, user_id: user_id.as_str(), infer: true };

        let response = self
            .client
            .post(format!("{}/v1/memories/", self.api_url))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(MemoryError::Unavailable(format!("mem0 rejected credentials ({status})")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MemoryError::CommitFailed(format!("mem0 add returned {status}: {text}")));
        }

        debug!(user_id = %user_id, stored, "mem0 commit");
        Ok(CommitAck { stored })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_core::message::Utterance;

    #[test]
    fn parses_wrapped_results() {
        let body = r#"{"results":[{"memory":"Name is Bruce","user_id":"bruce"},{"memory":"Likes tea"}]}"#;
        let facts = parse_search_response(body, &UserId::new("bruce")).unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].content, "Name is Bruce");
        assert!(facts.iter().all(|f| f.user_id.as_str() == "bruce"));
    }

    #[test]
    fn parses_bare_list_and_drops_foreign_owner() {
        let body = r#"[{"memory":"mine","user_id":"bruce"},{"memory":"theirs","user_id":"selina"}]"#;
        let facts = parse_search_response(body, &UserId::new("bruce")).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "mine");
    }

    #[test]
    fn invalid_body_is_unavailable() {
        let err = parse_search_response("<html>", &UserId::new("bruce")).unwrap_err();
        assert!(matches!(err, MemoryError::Unavailable(_)));
    }

    #[test]
    fn transcript_maps_to_roles() {
        let payload = CommitPayload::Transcript(vec![
            Utterance::user("Park on level 3"),
            Utterance::agent(""),
            Utterance::agent("Noted."),
        ]);
        let messages = commit_messages(&payload);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
    }

    #[tokio::test]
    async fn silent_server_times_out_as_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let held = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let store = Mem0Store::new(format!("http://{addr}"), "k").with_timeout(Duration::from_millis(300));
        let err = tokio::time::timeout(
            Duration::from_secs(10),
            store.recall(&UserId::new("bruce"), &MemoryQuery::new("name", 5)),
        )
        .await
        .expect("recall must not hang")
        .unwrap_err();

        assert!(matches!(err, MemoryError::Unavailable(ref m) if m.contains("in time")), "{err}");
        held.abort();
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let store = Mem0Store::new("https://api.mem0.ai/", "k");
        assert_eq!(store.api_url, "https://api.mem0.ai");
        assert_eq!(store.auth_header(), "Token k");
    }
}
