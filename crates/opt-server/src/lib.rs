use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use opt_core::{CancellationRegistry, EngineConfig, EventBus};
use opt_orchestrator::{RestOptimiser, SessionRegistry};

mod rest;
mod ws;

/// Shared process state handed to every handler: the session registry and
/// cancellation map the streaming variant uses, the single global
/// optimiser instance the REST ask/tell variant uses, and the
/// process-wide config and event bus.
#[derive(Clone)]
pub struct AppState {
    pub engine_config: EngineConfig,
    pub sessions: Arc<SessionRegistry>,
    pub cancellations: CancellationRegistry,
    pub event_bus: EventBus,
    pub rest_optimiser: Arc<Mutex<Option<RestOptimiser>>>,
}

impl AppState {
    pub fn new(engine_config: EngineConfig) -> Self {
        let state_dir = engine_config.state_dir();
        AppState {
            engine_config,
            sessions: Arc::new(SessionRegistry::new(state_dir)),
            cancellations: CancellationRegistry::new(),
            event_bus: EventBus::new(),
            rest_optimiser: Arc::new(Mutex::new(None)),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.engine_config.cors_allow_origins);

    Router::new()
        .route("/health", get(rest::health))
        .route("/config/preview", post(rest::config_preview))
        .route("/optimise", get(ws::optimise_ws))
        .route("/init", post(rest::init))
        .route("/observe", post(rest::observe))
        .route("/best", get(rest::best))
        .route("/status", get(rest::status))
        .route("/history", get(rest::history))
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

/// Serves the coordinator until `Ctrl-C`, then returns once the listener
/// has shut down cleanly.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "optimiser-engine listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await?;
    state.cancellations.cancel_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use opt_core::SamplerChoice;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(EngineConfig {
            cors_allow_origins: vec!["http://localhost:8000".to_string()],
            optuna_storage: Some(std::env::temp_dir().join(format!(
                "opt-server-test-{}",
                Utc::now().timestamp_nanos_opt().unwrap_or(0)
            )).to_string_lossy().to_string()),
            optuna_sampler: SamplerChoice::Auto,
            optuna_sampler_seed: Some(7),
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn init_then_observe_round_trips_a_suggestion() {
        let app = app_router(test_state());

        let init_body = serde_json::json!({
            "pbounds": {"x": [0.0, 1.0]},
            "init_points": 2,
            "n_iter": 2
        });
        let init_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/init")
                    .header("content-type", "application/json")
                    .body(Body::from(init_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(init_response.status(), StatusCode::OK);
        let bytes = to_bytes(init_response.into_body(), usize::MAX).await.unwrap();
        let suggestion: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(suggestion["params"]["x"].is_number());
        assert_eq!(suggestion["done"], false);

        let observe_body = serde_json::json!({
            "params": {"x": suggestion["params"]["x"]},
            "target": 1.0
        });
        let observe_response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/observe")
                    .header("content-type", "application/json")
                    .body(Body::from(observe_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(observe_response.status(), StatusCode::OK);
    }
}
