pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::error::{ApiError, Result};
use crate::services::ai::{AiError, LlmClient, SpeechSynthesizer, TextGenerator, TtsClient};
use crate::services::storage::StorageService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub storage: Arc<StorageService>,
    pub llm: Option<Arc<dyn TextGenerator>>,
    pub tts: Option<Arc<dyn SpeechSynthesizer>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// The language model client, or an error if none is configured.
    pub fn llm(&self) -> Result<Arc<dyn TextGenerator>> {
        self.llm
            .clone()
            .ok_or(ApiError::Upstream(AiError::NotConfigured("Language model")))
    }

    /// The text-to-speech client, or an error if none is configured.
    pub fn tts(&self) -> Result<Arc<dyn SpeechSynthesizer>> {
        self.tts
            .clone()
            .ok_or(ApiError::Upstream(AiError::NotConfigured("Text-to-speech")))
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    // Content management: guarded by ADMIN_TOKEN when one is configured
    let admin_routes = Router::new()
        .route(
            "/api/materials",
            get(routes::materials::list).post(routes::materials::create),
        )
        .route(
            "/api/materials/:id",
            patch(routes::materials::update).delete(routes::materials::delete),
        )
        .route("/api/materials/:id/status", patch(routes::materials::update_status))
        .route(
            "/api/materials/:id/questions",
            get(routes::questions::list).post(routes::questions::create),
        )
        .route(
            "/api/questions/:id",
            put(routes::questions::update).delete(routes::questions::delete),
        )
        .route("/api/upload", post(routes::uploads::upload))
        .route("/api/quizzes", post(routes::quizzes::create_legacy))
        .route("/api/quizzes/generate", post(routes::quizzes::generate))
        .route("/api/audio/generate", post(routes::audio::generate))
        .route("/api/audio/:id", delete(routes::audio::delete))
        .route("/api/advice/:id", delete(routes::advice::delete))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::admin_middleware,
        ));

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/materials/published", get(routes::materials::list_published))
        .route("/api/materials/:id", get(routes::materials::get))
        .route("/api/quizzes", get(routes::quizzes::list_legacy))
        .route("/api/quizzes/:id", get(routes::quizzes::get))
        .route("/api/quizzes/:id/submit", post(routes::quizzes::submit))
        .route("/api/audio", get(routes::audio::list))
        .route(
            "/api/progress",
            get(routes::progress::list).post(routes::progress::update),
        )
        .route("/api/progress/summary", get(routes::progress::summary))
        .route("/api/advice", get(routes::advice::list))
        .route("/api/advice/generate", post(routes::advice::generate));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .nest_service("/public", ServeDir::new(&state.config.public_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    tracing::info!(dir = %config.public_dir.display(), "Initializing file storage...");
    let storage = StorageService::new(&config.public_dir).await?;

    let llm: Option<Arc<dyn TextGenerator>> = match &config.llm {
        Some(endpoint) => {
            tracing::info!(model = %endpoint.model, "Language model configured");
            Some(Arc::new(LlmClient::new(endpoint.clone(), config.ai_timeout)?))
        }
        None => {
            tracing::warn!("LLM_API_KEY not set; quiz, lecture and advice generation are disabled");
            None
        }
    };

    let tts: Option<Arc<dyn SpeechSynthesizer>> = match &config.tts {
        Some(settings) => Some(Arc::new(TtsClient::new(settings.clone(), config.ai_timeout)?)),
        None => {
            tracing::warn!("No TTS key set; audio lecture generation is disabled");
            None
        }
    };

    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set; admin routes are open");
    }

    let addr = config.bind_addr();
    let state = AppState {
        db: Arc::new(db),
        storage: Arc::new(storage),
        llm,
        tts,
        config: Arc::new(config),
    };

    let app = build_router(state.clone());

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Closing database connections...");
    state.db.close().await;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
