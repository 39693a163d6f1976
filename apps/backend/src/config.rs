//! Environment configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct AiEndpoint {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Text-to-speech settings.
#[derive(Debug, Clone)]
pub struct TtsSettings {
    pub endpoint: AiEndpoint,
    pub voice: String,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Directory served under `/public`; uploads and generated audio live here.
    pub public_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Bearer token required on admin routes. Admin routes are open when unset.
    pub admin_token: Option<String>,
    /// `None` when `LLM_API_KEY` is unset.
    pub llm: Option<AiEndpoint>,
    /// `None` when neither `TTS_API_KEY` nor `LLM_API_KEY` is set.
    pub tts: Option<TtsSettings>,
    pub ai_timeout: Duration,
    /// Source text is cut to this many characters before prompting.
    pub max_source_chars: usize,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Env vars (all optional):
    /// - DATABASE_URL, HOST, PORT, PUBLIC_DIR, MAX_UPLOAD_BYTES, ADMIN_TOKEN
    /// - LLM_API_KEY, LLM_BASE_URL, LLM_MODEL
    /// - TTS_API_KEY (defaults to LLM_API_KEY), TTS_BASE_URL, TTS_MODEL, TTS_VOICE
    /// - AI_TIMEOUT_SECS, MAX_SOURCE_CHARS
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_key = non_empty("LLM_API_KEY");
        let llm_base = var_or("LLM_BASE_URL", "https://api.openai.com/v1");

        let llm = llm_key.clone().map(|api_key| AiEndpoint {
            api_key,
            base_url: llm_base.clone(),
            model: var_or("LLM_MODEL", "gpt-4o-mini"),
        });

        let tts = non_empty("TTS_API_KEY").or(llm_key).map(|api_key| TtsSettings {
            endpoint: AiEndpoint {
                api_key,
                base_url: var_or("TTS_BASE_URL", &llm_base),
                model: var_or("TTS_MODEL", "tts-1"),
            },
            voice: var_or("TTS_VOICE", "alloy"),
        });

        Ok(Self {
            database_url: var_or("DATABASE_URL", "sqlite://data/scrum_sensei.db"),
            host: var_or("HOST", "0.0.0.0"),
            port: parse_or("PORT", 3000)?,
            public_dir: PathBuf::from(var_or("PUBLIC_DIR", "public")),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            admin_token: non_empty("ADMIN_TOKEN"),
            llm,
            tts,
            ai_timeout: Duration::from_secs(parse_or("AI_TIMEOUT_SECS", 120)?),
            max_source_chars: parse_or("MAX_SOURCE_CHARS", 12_000)?,
        })
    }

    /// Configuration for tests: local paths, no AI endpoints, open admin routes.
    pub fn for_public_dir(database_url: &str, public_dir: PathBuf) -> Self {
        Self {
            database_url: database_url.to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            public_dir,
            max_upload_bytes: 20 * 1024 * 1024,
            admin_token: None,
            llm: None,
            tts: None,
            ai_timeout: Duration::from_secs(5),
            max_source_chars: 12_000,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    non_empty(name).unwrap_or_else(|| default.to_string())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
