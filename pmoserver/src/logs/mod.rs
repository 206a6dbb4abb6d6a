//! Initialisation du logging et réglage dynamique du niveau.
//!
//! Le niveau minimum vient de `host.logger.min_level` ; il peut être changé à
//! chaud via `GET/POST /api/log_setup`.

use std::sync::{Arc, RwLock};

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use pmoconfig::get_config;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const AVAILABLE_LEVELS: [&str; 5] = ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"];

/// Niveau courant et poignée de rechargement du filtre
#[derive(Clone)]
pub struct LogState {
    max_level: Arc<RwLock<Level>>,
    reload_handle: reload::Handle<LevelFilter, Registry>,
}

impl LogState {
    pub fn new(level: Level, reload_handle: reload::Handle<LevelFilter, Registry>) -> Self {
        Self {
            max_level: Arc::new(RwLock::new(level)),
            reload_handle,
        }
    }

    pub fn set_max_level(&self, level: Level) {
        *self.max_level.write().unwrap_or_else(|e| e.into_inner()) = level;

        let level_filter = level_to_levelfilter(level);
        if let Err(e) = self.reload_handle.reload(level_filter) {
            eprintln!("❌ Failed to reload log level filter: {}", e);
        }
    }

    pub fn get_max_level(&self) -> Level {
        *self.max_level.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Options d'initialisation du système de logging
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub min_level: Level,
    /// Activer la sortie vers stderr/stdout
    pub enable_console: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            min_level: Level::INFO,
            enable_console: true,
        }
    }
}

impl LoggingOptions {
    /// Options lues dans `host.logger`.
    pub fn from_config() -> Self {
        let config = get_config();
        let min_level = config
            .get_log_min_level()
            .ok()
            .and_then(|l| string_to_level(&l))
            .unwrap_or(Level::INFO);
        let enable_console = config.get_log_enable_console().unwrap_or(true);
        Self {
            min_level,
            enable_console,
        }
    }
}

/// Installe le subscriber global : filtre rechargeable puis console.
///
/// Un second appel garde le subscriber déjà installé ; le `LogState` rendu
/// ne pilote alors que son propre filtre.
pub fn init_logging(options: LoggingOptions) -> LogState {
    let (filter, reload_handle) = reload::Layer::new(level_to_levelfilter(options.min_level));
    let log_state = LogState::new(options.min_level, reload_handle);

    let subscriber = Registry::default().with(filter);
    let result = if options.enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };
    if let Err(e) = result {
        eprintln!("⚠️ Logging already initialised: {}", e);
    }

    log_state
}

/// Request body pour la configuration du logging
#[derive(Debug, Deserialize)]
pub struct LogSetupRequest {
    pub level: String,
}

/// Response pour la configuration du logging
#[derive(Debug, Serialize)]
pub struct LogSetupResponse {
    pub current_level: String,
    pub available_levels: Vec<String>,
}

impl LogSetupResponse {
    fn new(level: Level) -> Self {
        Self {
            current_level: level_to_string(level),
            available_levels: AVAILABLE_LEVELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// `GET /api/log_setup`
pub async fn log_setup_get(State(state): State<LogState>) -> impl IntoResponse {
    Json(LogSetupResponse::new(state.get_max_level()))
}

/// `POST /api/log_setup`
pub async fn log_setup_post(
    State(state): State<LogState>,
    Json(payload): Json<LogSetupRequest>,
) -> impl IntoResponse {
    let Some(level) = string_to_level(&payload.level) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid log level. Must be one of: ERROR, WARN, INFO, DEBUG, TRACE"
            })),
        )
            .into_response();
    };

    state.set_max_level(level);
    tracing::info!("🔧 Log level changed to: {}", payload.level);
    (StatusCode::OK, Json(LogSetupResponse::new(level))).into_response()
}

/// Crée le router pour l'API de gestion des logs
pub fn create_logs_router(log_state: LogState) -> axum::Router {
    use axum::routing::get;
    axum::Router::new()
        .route("/log_setup", get(log_setup_get).post(log_setup_post))
        .with_state(log_state)
}

pub fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

fn level_to_string(level: Level) -> String {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
    .to_string()
}

fn level_to_levelfilter(level: Level) -> LevelFilter {
    match level {
        Level::ERROR => LevelFilter::ERROR,
        Level::WARN => LevelFilter::WARN,
        Level::INFO => LevelFilter::INFO,
        Level::DEBUG => LevelFilter::DEBUG,
        Level::TRACE => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> LogState {
        let (_filter, handle) = reload::Layer::<LevelFilter, Registry>::new(LevelFilter::INFO);
        LogState::new(Level::INFO, handle)
    }

    #[test]
    fn test_string_to_level() {
        assert_eq!(string_to_level(" debug "), Some(Level::DEBUG));
        assert_eq!(string_to_level("verbose"), None);
    }

    #[tokio::test]
    async fn test_log_setup_routes() {
        let state = state();
        let app = create_logs_router(state.clone());

        let resp = app
            .clone()
            .oneshot(
                Request::post("/log_setup")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"level":"warn"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.get_max_level(), Level::WARN);

        let resp = app
            .oneshot(Request::get("/log_setup").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["current_level"], "WARN");
    }

    #[tokio::test]
    async fn test_log_setup_rejects_unknown_level() {
        let app = create_logs_router(state());
        let resp = app
            .oneshot(
                Request::post("/log_setup")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"level":"loud"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
