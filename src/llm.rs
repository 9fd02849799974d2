//! Chat-completions client for hosted LLM providers.
//!
//! Speaks the OpenAI-compatible `POST /chat/completions` wire format used by
//! both Groq and OpenAI. The answer path makes a single synchronous call —
//! no retries, no backoff, no circuit breaking — and every failure surfaces
//! as a typed [`QaError::Llm`].
//!
//! API keys come from the environment: `GROQ_API_KEY` for the `groq`
//! provider, `OPENAI_API_KEY` for `openai`.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{QaError, QaResult};

const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// One message in a chat request. `role` is `system`, `user`, or
/// `assistant`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

pub struct LlmClient {
    config: LlmConfig,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl LlmClient {
    /// Build a client from configuration, resolving the endpoint and API
    /// key for the configured provider.
    pub fn new(config: &LlmConfig) -> QaResult<Self> {
        let (default_url, key_var) = match config.provider.as_str() {
            "groq" => (GROQ_URL, "GROQ_API_KEY"),
            "openai" => (OPENAI_URL, "OPENAI_API_KEY"),
            other => {
                return Err(QaError::Llm(format!("unknown llm provider: {}", other)));
            }
        };

        let api_key = std::env::var(key_var)
            .map_err(|_| QaError::Llm(format!("{} environment variable not set", key_var)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QaError::Llm(e.to_string()))?;

        Ok(Self {
            config: config.clone(),
            url: config.url.clone().unwrap_or_else(|| default_url.to_string()),
            api_key,
            client,
        })
    }

    /// Send one chat request and return the generated text.
    pub async fn chat(&self, messages: &[ChatMessage]) -> QaResult<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": messages,
        });

        debug!(model = %self.config.model, messages = messages.len(), "llm request");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| QaError::Llm(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(QaError::Llm(format!(
                "API error {}: {}",
                status,
                body_text.chars().take(500).collect::<String>()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QaError::Llm(format!("invalid response body: {}", e)))?;

        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> QaResult<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| QaError::Llm("malformed response: missing choices[0].message.content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_response() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Paris."}}]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Paris.");
    }

    #[test]
    fn malformed_response_is_llm_error() {
        for json in [
            serde_json::json!({}),
            serde_json::json!({"choices": []}),
            serde_json::json!({"choices": [{"message": {}}]}),
        ] {
            assert!(matches!(
                parse_chat_response(&json),
                Err(QaError::Llm(_))
            ));
        }
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
        assert_eq!(ChatMessage::assistant("a").role, "assistant");
    }
}
