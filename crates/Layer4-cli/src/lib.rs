//! # pilot-server
//!
//! Pilot HTTP 서버 - task 생성, 진행 이벤트 SSE 스트림, 종료 요청
//!
//! 서버는 `start_server()`로 시작합니다. 라우터만 필요하면 `build_router()`를 씁니다.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{http::Method, Router};
use pilot_foundation::{LlmClient, PilotConfig};
use pilot_provider::OpenAiClient;
use pilot_sandbox::SandboxManager;
use pilot_task::TaskRegistry;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod factory;
pub mod routes;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ApiError, AppError};
pub use factory::{AgentFactory, GeneralAgentFactory, TaskSpec};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: TaskRegistry,
    pub factory: Arc<dyn AgentFactory>,
    pub config: Arc<PilotConfig>,
}

impl AppState {
    pub fn new(config: Arc<PilotConfig>, factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            registry: TaskRegistry::new(config.stream.clone()),
            factory,
            config,
        }
    }
}

/// Build the Axum router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    routes::api_router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 설정으로 기본 상태 구성 (Docker 연결, 기본 LLM 클라이언트)
pub async fn build_state(config: PilotConfig) -> anyhow::Result<AppState> {
    let config = Arc::new(config);

    let sandboxes = SandboxManager::connect(config.sandbox.clone())
        .await
        .context("Failed to connect to Docker")?;

    let llm: Option<Arc<dyn LlmClient>> = match OpenAiClient::from_settings(&config.llm) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(
                "No default LLM client ({}); tasks must provide llm_config",
                e
            );
            None
        }
    };

    let factory = GeneralAgentFactory::new(config.clone(), llm, Arc::new(sandboxes));
    Ok(AppState::new(config, Arc::new(factory)))
}

/// Start the Pilot server and block until shutdown.
pub async fn start_server(config: PilotConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = build_state(config).await?;
    let registry = state.registry.clone();
    let app = build_router(state);

    tracing::info!("Pilot server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    Ok(())
}

async fn shutdown_signal(registry: TaskRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }

    let count = registry.terminate_all().await;
    tracing::info!(tasks = count, "Shutting down, termination requested for running tasks");
}
