//! HTTP client for chat model APIs.
//!
//! Two call shapes: constrained (a JSON schema the response must match) and
//! free text. The pipeline stages only ever see the [`ChatModel`] trait, so
//! any provider can be substituted.

use crate::types::error::{AskError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

/// Abstract model boundary for the pipeline stages.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Structured invocation: the response must conform to `output_schema`.
    /// Returns the parsed JSON object, not free text.
    async fn invoke_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        output_schema: &Value,
    ) -> Result<Value>;

    /// Free-text invocation: returns the raw model text.
    async fn invoke_text(&self, prompt: &str) -> Result<String>;
}

/// Model provider, inferred from the model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn from_model(model: &str) -> Self {
        if model.starts_with("claude") || model.starts_with("anthropic") {
            Provider::Anthropic
        } else {
            Provider::OpenAi
        }
    }
}

/// Chat model client over the OpenAI or Anthropic HTTP API.
pub struct HttpChatModel {
    api_key: String,
    model: String,
    provider: Provider,
    base_url: String,
    client: Client,
}

/// OpenAI chat completion response.
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

/// Anthropic messages response.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

impl HttpChatModel {
    /// Create a new client. Provider and endpoint follow from the model name.
    pub fn new(api_key: String, model: String) -> Self {
        let provider = Provider::from_model(&model);
        let base_url = match provider {
            Provider::OpenAi => "https://api.openai.com/v1".to_string(),
            Provider::Anthropic => "https://api.anthropic.com/v1".to_string(),
        };
        Self {
            api_key,
            model,
            provider,
            base_url,
            client: Client::new(),
        }
    }

    /// Create from environment variables.
    ///
    /// Uses `ASKDB_MODEL` for the model (default: "gpt-4o-mini") and
    /// `OPENAI_API_KEY` or `ANTHROPIC_API_KEY` based on the model name.
    pub fn from_env() -> Result<Self> {
        let model =
            std::env::var("ASKDB_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let api_key = match Provider::from_model(&model) {
            Provider::Anthropic => std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
                AskError::ConfigError(
                    "ANTHROPIC_API_KEY environment variable not set".to_string(),
                )
            })?,
            Provider::OpenAi => std::env::var("OPENAI_API_KEY").map_err(|_| {
                AskError::ConfigError(
                    "OPENAI_API_KEY environment variable not set".to_string(),
                )
            })?,
        };

        Ok(Self::new(api_key, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Strip markdown code blocks from a model response.
    ///
    /// Handles:
    /// - ```json ... ```
    /// - ``` ... ```
    fn strip_markdown(text: &str) -> String {
        let text = text.trim();

        if text.starts_with("```") {
            let start = text.find('\n').map(|i| i + 1).unwrap_or(0);
            let end = text.rfind("```").unwrap_or(text.len());
            return text[start..end].trim().to_string();
        }

        text.to_string()
    }

    /// OpenAI request body for a structured call: strict `json_schema`
    /// response format, so the reply is the contract object itself.
    fn openai_structured_body(&self, system: &str, user: &str, schema: &Value) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "output",
                    "strict": true,
                    "schema": schema
                }
            },
            "temperature": 0.1
        })
    }

    /// Anthropic request body for a structured call: a single forced tool
    /// whose `input_schema` is the contract.
    fn anthropic_structured_body(&self, system: &str, user: &str, schema: &Value) -> Value {
        json!({
            "model": self.model,
            "max_tokens": 1024,
            "system": system,
            "messages": [
                {"role": "user", "content": user}
            ],
            "tools": [{
                "name": "output",
                "description": "Structured output",
                "input_schema": schema
            }],
            "tool_choice": {"type": "tool", "name": "output"},
            "temperature": 0.1
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<String> {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        let request = match self.provider {
            Provider::OpenAi => {
                request.header("Authorization", format!("Bearer {}", self.api_key))
            }
            Provider::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
        };

        let response = request
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AskError::LlmError(format!("API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AskError::LlmError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(AskError::LlmError(format!("API error {}: {}", status, body)));
        }

        Ok(body)
    }

    fn parse_openai_text(body: &str) -> Result<String> {
        let parsed: OpenAiResponse = serde_json::from_str(body)
            .map_err(|e| AskError::LlmError(format!("Failed to parse OpenAI response: {}", e)))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AskError::LlmError("No response from OpenAI".to_string()))?
            .message
            .content)
    }

    fn parse_anthropic(body: &str) -> Result<AnthropicResponse> {
        serde_json::from_str(body)
            .map_err(|e| AskError::LlmError(format!("Failed to parse Anthropic response: {}", e)))
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn invoke_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        output_schema: &Value,
    ) -> Result<Value> {
        match self.provider {
            Provider::OpenAi => {
                let body =
                    self.openai_structured_body(system_prompt, user_prompt, output_schema);
                let response = self.post("/chat/completions", &body).await?;
                let content = Self::parse_openai_text(&response)?;
                serde_json::from_str(&Self::strip_markdown(&content)).map_err(|e| {
                    AskError::LlmError(format!("Response is not valid JSON: {}", e))
                })
            }
            Provider::Anthropic => {
                let body =
                    self.anthropic_structured_body(system_prompt, user_prompt, output_schema);
                let response = self.post("/messages", &body).await?;
                let parsed = Self::parse_anthropic(&response)?;
                parsed
                    .content
                    .into_iter()
                    .find(|c| c.kind == "tool_use")
                    .and_then(|c| c.input)
                    .ok_or_else(|| {
                        AskError::LlmError("No tool output in Anthropic response".to_string())
                    })
            }
        }
    }

    async fn invoke_text(&self, prompt: &str) -> Result<String> {
        match self.provider {
            Provider::OpenAi => {
                let body = json!({
                    "model": self.model,
                    "messages": [{"role": "user", "content": prompt}],
                    "temperature": 0.1
                });
                let response = self.post("/chat/completions", &body).await?;
                Self::parse_openai_text(&response)
            }
            Provider::Anthropic => {
                let body = json!({
                    "model": self.model,
                    "max_tokens": 1024,
                    "messages": [{"role": "user", "content": prompt}],
                    "temperature": 0.1
                });
                let response = self.post("/messages", &body).await?;
                let parsed = Self::parse_anthropic(&response)?;
                parsed
                    .content
                    .into_iter()
                    .find_map(|c| c.text)
                    .ok_or_else(|| {
                        AskError::LlmError("No text in Anthropic response".to_string())
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_model() {
        assert_eq!(Provider::from_model("claude-haiku-4-5"), Provider::Anthropic);
        assert_eq!(Provider::from_model("anthropic/claude-3"), Provider::Anthropic);
        assert_eq!(Provider::from_model("gpt-4o-mini"), Provider::OpenAi);
        assert_eq!(Provider::from_model("o3-mini"), Provider::OpenAi);
    }

    #[test]
    fn test_strip_markdown_json_fence() {
        let text = "```json\n{\"query\": \"SELECT 1\"}\n```";
        assert_eq!(
            HttpChatModel::strip_markdown(text),
            "{\"query\": \"SELECT 1\"}"
        );
    }

    #[test]
    fn test_strip_markdown_plain_fence() {
        let text = "```\nSELECT 1\n```";
        assert_eq!(HttpChatModel::strip_markdown(text), "SELECT 1");
    }

    #[test]
    fn test_strip_markdown_passthrough() {
        assert_eq!(
            HttpChatModel::strip_markdown("{\"query\": \"SELECT 1\"}"),
            "{\"query\": \"SELECT 1\"}"
        );
    }

    #[test]
    fn test_openai_structured_body_shape() {
        let model = HttpChatModel::new("key".to_string(), "gpt-4o-mini".to_string());
        let schema = json!({"type": "object"});
        let body = model.openai_structured_body("sys", "user", &schema);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn test_anthropic_structured_body_forces_tool() {
        let model = HttpChatModel::new("key".to_string(), "claude-haiku-4-5".to_string());
        let schema = json!({"type": "object"});
        let body = model.anthropic_structured_body("sys", "user", &schema);

        assert_eq!(body["tool_choice"]["type"], "tool");
        assert_eq!(body["tools"][0]["input_schema"], schema);
        assert_eq!(body["system"], "sys");
    }

    #[test]
    fn test_parse_openai_text() {
        let body = r#"{"choices": [{"message": {"content": "hello"}}]}"#;
        assert_eq!(HttpChatModel::parse_openai_text(body).unwrap(), "hello");

        let empty = r#"{"choices": []}"#;
        assert!(HttpChatModel::parse_openai_text(empty).is_err());
    }

    #[test]
    fn test_parse_anthropic_tool_use() {
        let body = r#"{"content": [{"type": "tool_use", "input": {"query": "SELECT 1"}}]}"#;
        let parsed = HttpChatModel::parse_anthropic(body).unwrap();
        let input = parsed
            .content
            .into_iter()
            .find(|c| c.kind == "tool_use")
            .and_then(|c| c.input)
            .unwrap();
        assert_eq!(input["query"], "SELECT 1");
    }
}
