//! OpenAI-compatible language model.
//!
//! Works with any endpoint exposing `/chat/completions`: Gemini's OpenAI
//! layer (the default), OpenAI, OpenRouter, Ollama, vLLM.
//!
//! `decide` sends the tool declarations and maps the reply's tool calls
//! onto a [`Decision`]; `generate` sends the assembled context with no
//! tools and returns the text.

use async_trait::async_trait;
use oracle_config::ModelConfig;
use oracle_core::error::ProviderError;
use oracle_core::provider::{Decision, LanguageModel, ModelContext, ToolRequest};
use oracle_core::tool::{ToolDefinition, RECALL_TOOL_NAME};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible chat-completions model.
pub struct OpenAiCompatModel {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.8,
            max_tokens: None,
            client,
        }
    }

    /// Build from the `[model]` config table. Fails when no API key is set.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("no model API key set".into()))?;
        let name = if config.base_url.contains("googleapis.com") { "gemini" } else { "openai_compat" };

        Ok(Self::new(name, &config.base_url, api_key, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert a model context to OpenAI API messages.
    fn to_api_messages(context: &ModelContext) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(context.turns.len() + 1);
        if !context.system.is_empty() {
            messages.push(ApiMessage {
                role: "system".into(),
                content: Some(context.system.clone()),
                tool_calls: None,
            });
        }
        messages.extend(context.turns.iter().map(|u| ApiMessage {
            role: u.speaker().role().into(),
            content: Some(u.text().to_string()),
            tool_calls: None,
        }));
        messages
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    async fn complete(&self, body: serde_json::Value) -> Result<ApiMessage, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_secs: 5 });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model endpoint returned error");
            return Err(ProviderError::ApiError { status_code: status, message: error_body });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))
    }

    fn request_body(&self, context: &ModelContext) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(context),
            "temperature": self.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

/// Map one assistant message onto a [`Decision`].
///
/// No tool calls means the content is the final reply. A `recall_memory`
/// call becomes a recall; any other call becomes a tool call; both together
/// are a hybrid. Only the first of each kind is honoured.
pub(crate) fn decision_from_message(message: ApiMessage) -> Result<Decision, ProviderError> {
    let calls = message.tool_calls.unwrap_or_default();
    if calls.is_empty() {
        let reply = message.content.unwrap_or_default().trim().to_string();
        if reply.is_empty() {
            return Err(ProviderError::InvalidResponse("Empty reply with no tool calls".into()));
        }
        return Ok(Decision::Direct { reply });
    }

    let total = calls.len();
    let mut recall: Option<String> = None;
    let mut tool: Option<ToolRequest> = None;
    for call in calls {
        let arguments = parse_arguments(&call.function.arguments);
        if call.function.name == RECALL_TOOL_NAME {
            if recall.is_none() {
                let query = arguments["query"].as_str().unwrap_or_default().to_string();
                recall = Some(query);
            }
        } else if tool.is_none() {
            tool = Some(ToolRequest::new(call.function.name, arguments));
        }
    }
    let used = usize::from(recall.is_some()) + usize::from(tool.is_some());
    if total > used {
        warn!(requested = total, used, "Model requested more tool calls than one turn runs; extras ignored");
    }

    match (recall, tool) {
        (Some(query), Some(tool)) => Ok(Decision::Hybrid { query, tool }),
        (Some(query), None) => Ok(Decision::Recall { query }),
        (None, Some(tool)) => Ok(Decision::ToolCall(tool)),
        (None, None) => Err(ProviderError::InvalidResponse("Tool calls without names".into())),
    }
}

/// Tool arguments arrive as a JSON string. Unparseable text is kept as a
/// string value so schema validation rejects it.
fn parse_arguments(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[async_trait]
impl LanguageModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(
        &self,
        context: &ModelContext,
        tools: &[ToolDefinition],
    ) -> Result<Decision, ProviderError> {
        let mut body = self.request_body(context);
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(tools));
            body["tool_choice"] = serde_json::json!("auto");
        }
        let message = self.complete(body).await?;
        decision_from_message(message)
    }

    async fn generate(&self, context: &ModelContext) -> Result<String, ProviderError> {
        let message = self.complete(self.request_body(context)).await?;
        let text = message.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse("Empty reply".into()));
        }
        Ok(text)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}
