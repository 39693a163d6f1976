//! OpenAI-compatible `/audio/speech` client

use async_trait::async_trait;
use serde::Serialize;

use super::{endpoint_url, http_client, upstream_error, AiError, SpeechSynthesizer};
use crate::config::TtsSettings;

/// Longest input the speech endpoint accepts, in characters.
pub const MAX_TTS_INPUT_CHARS: usize = 4096;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

pub struct TtsClient {
    http_client: reqwest::Client,
    settings: TtsSettings,
}

impl TtsClient {
    pub fn new(settings: TtsSettings, timeout: std::time::Duration) -> Result<Self, AiError> {
        Ok(Self {
            http_client: http_client(timeout)?,
            settings,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AiError> {
        let input = clip_input(text);
        if input.len() < text.len() {
            tracing::warn!(
                chars = text.chars().count(),
                limit = MAX_TTS_INPUT_CHARS,
                "Lecture script is longer than the speech limit; clipping"
            );
        }

        let request = SpeechRequest {
            model: &self.settings.endpoint.model,
            voice: &self.settings.voice,
            input,
            response_format: "mp3",
        };

        let response = self
            .http_client
            .post(endpoint_url(&self.settings.endpoint.base_url, "audio/speech"))
            .bearer_auth(&self.settings.endpoint.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if is_json {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::UnexpectedShape(format!("expected audio, got JSON: {body}")));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(AiError::UnexpectedShape("empty audio body".to_string()));
        }

        tracing::debug!(bytes = audio.len(), "Speech synthesized");
        Ok(audio.to_vec())
    }
}

/// Cut text to [`MAX_TTS_INPUT_CHARS`] on a char boundary.
fn clip_input(text: &str) -> &str {
    match text.char_indices().nth(MAX_TTS_INPUT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
