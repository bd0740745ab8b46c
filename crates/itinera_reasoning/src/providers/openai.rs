use crate::api_types::{Message, MessagesResponse, Role};
use crate::llm::{CompletionParams, LlmClient};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Chat-completions client for OpenAI-compatible endpoints (DeepSeek, OpenAI,
/// local proxies).
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    provider_name: String,
    retry: RetryConfig,
}

impl OpenAiClient {
    pub fn new(
        provider_name: &str,
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            provider_name: provider_name.to_string(),
            retry: RetryConfig::default(),
        })
    }

    fn build_payload(&self, system: &str, messages: &[Message], params: &CompletionParams) -> Value {
        // System prompt goes first as its own message
        let mut openai_messages = Vec::with_capacity(messages.len() + 1);
        openai_messages.push(json!({
            "role": "system",
            "content": system
        }));
        for msg in messages {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            openai_messages.push(json!({
                "role": role,
                "content": msg.content
            }));
        }

        json!({
            "model": self.model,
            "messages": openai_messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        })
    }
}

/// Pull the assistant text and finish reason out of a chat-completions body.
fn parse_completion(resp_json: &Value) -> Result<MessagesResponse> {
    let choice = resp_json
        .get("choices")
        .and_then(|c| c.get(0))
        .context("Completion response has no choices")?;
    let content = choice["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let stop_reason = choice["finish_reason"].as_str().map(|s| s.to_string());
    Ok(MessagesResponse {
        content,
        stop_reason,
    })
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse> {
        let payload = self.build_payload(system, &messages, &params);
        let url = format!("{}/chat/completions", self.base_url);

        let response = with_retry(&self.retry, &self.provider_name, || {
            let request = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&payload);
            async move { request.send().await.map_err(anyhow::Error::from) }
        })
        .await?;

        let resp_json: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to decode {} response", self.provider_name))?;
        parse_completion(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(
            "deepseek",
            "https://api.deepseek.com/v1/",
            "sk-test",
            "deepseek-chat",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trimmed() {
        assert_eq!(client().base_url, "https://api.deepseek.com/v1");
    }

    #[test]
    fn test_payload_puts_system_first() {
        let payload = client().build_payload(
            "be brief",
            &[Message::user("plan a trip"), Message::assistant("Thought: ok")],
            &CompletionParams::default(),
        );
        let msgs = payload["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[1]["role"], "user");
        assert_eq!(msgs[2]["role"], "assistant");
        assert_eq!(payload["model"], "deepseek-chat");
    }

    #[test]
    fn test_parse_completion() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}]
        });
        let resp = parse_completion(&body).unwrap();
        assert_eq!(resp.content, "hello");
        assert_eq!(resp.stop_reason.as_deref(), Some("stop"));

        assert!(parse_completion(&json!({"choices": []})).is_err());
    }
}
