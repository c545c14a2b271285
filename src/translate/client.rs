use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::config::CompletionConfig;
use crate::error::{Result, SubtranError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Request body for an OpenAI-compatible `/chat/completions` call
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Boundary to the external text-completion service.
///
/// Every error returned here is treated as retryable by the batch runner.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the messages and return the completion text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Client for OpenAI-compatible chat completion endpoints (Groq, OpenAI, local servers)
pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ChatCompletionClient {
    pub fn new(config: &CompletionConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build a client using the key found in the configured environment variable
    pub fn from_env(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            SubtranError::Config(format!(
                "API key not found: set the {} environment variable",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);

        debug!("Sending completion request to: {} ({} messages)", url, request.messages.len());

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| SubtranError::Completion(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubtranError::Completion(format!(
                "Completion API error {}: {}", status, error_text
            )));
        }

        let completion: CompletionResponse = response.json().await
            .map_err(|e| SubtranError::Completion(format!("Failed to parse response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        debug!("Raw completion: {}", content);

        if content.is_empty() {
            return Err(SubtranError::Completion("Empty completion received".to_string()));
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_without_absent_max_tokens() {
        let request = CompletionRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::system("rules"), ChatMessage::user("[0] Hi")],
            temperature: 0.1,
            max_tokens: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "[0] Hi");
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn test_response_shape_parses() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":" [0] Përshëndetje "}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some(" [0] Përshëndetje "));
    }

    #[test]
    fn test_from_env_requires_key() {
        let mut config = crate::config::Config::default().completion;
        config.api_key_env = "SUBTRAN_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        let err = ChatCompletionClient::from_env(&config).err().unwrap();
        assert!(matches!(err, SubtranError::Config(_)));
    }

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let mut config = crate::config::Config::default().completion;
        config.endpoint = "http://localhost:8080/v1/".to_string();
        let client = ChatCompletionClient::new(&config, "k".to_string()).unwrap();
        assert_eq!(client.endpoint, "http://localhost:8080/v1");
    }
}
