//! Clients for the language-model and text-to-speech vendors.
//!
//! Handlers only see the [`TextGenerator`] and [`SpeechSynthesizer`] traits so
//! tests can swap in canned responses.

pub mod llm;
pub mod tts;

use async_trait::async_trait;
use thiserror::Error;

pub use llm::LlmClient;
pub use tts::TtsClient;

const USER_AGENT: &str = concat!("scrum-sensei/", env!("CARGO_PKG_VERSION"));

/// Errors from an AI vendor call
#[derive(Debug, Error)]
pub enum AiError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx reply; the vendor body is kept so callers can surface it.
    #[error("Vendor returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Unexpected response from vendor: {0}")]
    UnexpectedShape(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Network(err.to_string())
    }
}

/// Produces a text completion for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, AiError>;
}

/// Turns text into encoded audio (MP3).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AiError>;
}

/// Build a JSON client with the shared user agent and request timeout.
fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, AiError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(AiError::from)
}

/// Join a base URL and an endpoint path without doubling slashes.
fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Read a non-2xx reply into [`AiError::Upstream`].
async fn upstream_error(response: reqwest::Response) -> AiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    AiError::Upstream { status, body }
}
