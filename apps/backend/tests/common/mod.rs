//! Common test utilities for integration tests.
//!
//! Each [`TestContext`] gets its own temporary directory holding a SQLite
//! database file and the public directory, so tests run in parallel without
//! sharing state. AI vendors are replaced by [`StubLlm`] and [`StubTts`].

pub mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use tempfile::TempDir;

use scrum_sensei_backend::config::Config;
use scrum_sensei_backend::db::Database;
use scrum_sensei_backend::models::{DbMaterial, MaterialStatus, MaterialType, NewMaterial};
use scrum_sensei_backend::services::ai::{AiError, SpeechSynthesizer, TextGenerator};
use scrum_sensei_backend::services::storage::StorageService;
use scrum_sensei_backend::{build_router, AppState};

/// Canned vendor behaviour
#[derive(Clone)]
pub enum StubReply {
    Text(String),
    Audio(Vec<u8>),
    Upstream { status: u16, body: String },
}

impl StubReply {
    fn into_error(self) -> AiError {
        match self {
            StubReply::Upstream { status, body } => AiError::Upstream { status, body },
            _ => AiError::UnexpectedShape("stub has no reply of this kind".to_string()),
        }
    }
}

/// Language model stub that records prompts.
pub struct StubLlm {
    reply: StubReply,
    pub prompts: Mutex<Vec<String>>,
}

impl StubLlm {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: StubReply::Text(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: StubReply::Upstream {
                status,
                body: body.to_string(),
            },
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for StubLlm {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String, AiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            StubReply::Text(text) => Ok(text.clone()),
            other => Err(other.clone().into_error()),
        }
    }
}

/// Speech stub returning fixed audio bytes.
pub struct StubTts {
    reply: StubReply,
    calls: AtomicUsize,
}

impl StubTts {
    pub fn returning(audio: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            reply: StubReply::Audio(audio.to_vec()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: StubReply::Upstream {
                status,
                body: body.to_string(),
            },
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for StubTts {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            StubReply::Audio(bytes) => Ok(bytes.clone()),
            other => Err(other.clone().into_error()),
        }
    }
}

/// Knobs for [`TestContext::with_options`].
#[derive(Default)]
pub struct TestOptions {
    pub llm: Option<Arc<StubLlm>>,
    pub tts: Option<Arc<StubTts>>,
    pub admin_token: Option<String>,
    pub max_upload_bytes: Option<usize>,
}

/// Test context containing database, storage and router.
pub struct TestContext {
    pub db: Arc<Database>,
    pub storage: Arc<StorageService>,
    app: Router,
    _dir: TempDir,
}

impl TestContext {
    /// Context with no AI vendors and open admin routes.
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    /// Context whose language model answers every prompt with `reply`.
    pub async fn with_llm(llm: Arc<StubLlm>) -> Self {
        Self::with_options(TestOptions {
            llm: Some(llm),
            ..Default::default()
        })
        .await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let database_url = format!("sqlite://{}", dir.path().join("test.db").display());

        let db = Database::connect(&database_url)
            .await
            .expect("Failed to open test database");
        db.run_migrations().await.expect("Failed to run migrations");
        let db = Arc::new(db);

        let mut config = Config::for_public_dir(&database_url, dir.path().join("public"));
        config.admin_token = options.admin_token;
        if let Some(limit) = options.max_upload_bytes {
            config.max_upload_bytes = limit;
        }

        let storage = Arc::new(
            StorageService::new(&config.public_dir)
                .await
                .expect("Failed to create storage"),
        );

        let state = AppState {
            db: db.clone(),
            storage: storage.clone(),
            llm: options.llm.map(|l| l as Arc<dyn TextGenerator>),
            tts: options.tts.map(|t| t as Arc<dyn SpeechSynthesizer>),
            config: Arc::new(config),
        };

        Self {
            db,
            storage,
            app: build_router(state),
            _dir: dir,
        }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Insert a text material directly.
    pub async fn create_text_material(&self, title: &str, text: &str) -> DbMaterial {
        self.db
            .create_material(&NewMaterial {
                title: title.to_string(),
                description: None,
                material_type: MaterialType::Text,
                status: MaterialStatus::Draft,
                file_path: None,
                content: Some(text.to_string()),
                source_material_id: None,
            })
            .await
            .expect("Failed to create material")
    }

    /// Number of files under the public directory's `dir` subdirectory.
    pub fn count_files(&self, dir: &str) -> usize {
        std::fs::read_dir(self.storage.root().join(dir))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Format authorization header value.
    pub fn auth_header_value(token: &str) -> String {
        format!("Bearer {}", token)
    }
}
