//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{endpoint_url, http_client, upstream_error, AiError, TextGenerator};
use crate::config::AiEndpoint;

const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct LlmClient {
    http_client: reqwest::Client,
    endpoint: AiEndpoint,
}

impl LlmClient {
    pub fn new(endpoint: AiEndpoint, timeout: std::time::Duration) -> Result<Self, AiError> {
        Ok(Self {
            http_client: http_client(timeout)?,
            endpoint,
        })
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.endpoint.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
        };

        tracing::debug!(model = %self.endpoint.model, prompt_chars = prompt.len(), "Requesting completion");

        let response = self
            .http_client
            .post(endpoint_url(&self.endpoint.base_url, "chat/completions"))
            .bearer_auth(&self.endpoint.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body = response.text().await?;
        completion_text(&body)
    }
}

/// Pull `choices[0].message.content` out of a completion body.
fn completion_text(body: &str) -> Result<String, AiError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| AiError::UnexpectedShape(e.to_string()))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AiError::UnexpectedShape("response has no choices".to_string()))?;

    if choice.finish_reason.as_deref() == Some("length") {
        tracing::warn!("Completion hit the token limit; output may be truncated");
    }

    choice
        .message
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AiError::UnexpectedShape("first choice has no message content".to_string()))
}
