//! Task endpoints
//!
//! - `POST /tasks`: task 생성 후 백그라운드 실행
//! - `GET /tasks`: 최신순 목록
//! - `GET /tasks/:task_id/events`: SSE 진행 스트림
//! - `POST /tasks/terminate`: 종료 요청

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::{header::HeaderName, HeaderValue},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use pilot_agent::{parse_history, RequestedTool};
use pilot_foundation::config::LlmSettings;
use pilot_task::{StreamItem, TaskInfo};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::AppError;
use crate::factory::TaskSpec;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_task).get(list_tasks))
        .route("/terminate", post(terminate_task))
        .route("/:task_id/events", get(task_events))
        .route("/:scope/:task_id/events", get(scoped_task_events))
}

// ============================================================================
// Request / Response
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Preferences {
    pub max_steps: Option<u32>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub task_id: String,
    pub prompt: String,
    #[serde(default)]
    pub should_plan: bool,
    /// builtin 이름 또는 MCP 서버 설정 (객체 혹은 JSON 문자열)
    #[serde(default)]
    pub tools: Vec<Value>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub history: Vec<Value>,
    #[serde(default)]
    pub llm_config: Option<LlmSettings>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TerminateRequest {
    pub task_id: String,
}

impl CreateTaskRequest {
    fn into_spec(self) -> Result<TaskSpec, AppError> {
        if self.task_id.trim().is_empty() {
            return Err(AppError::BadRequest("task_id must not be empty".into()));
        }

        if self.preferences.max_steps == Some(0) {
            return Err(AppError::BadRequest("max_steps must be at least 1".into()));
        }

        let tools = self
            .tools
            .iter()
            .map(|tool| RequestedTool::parse(tool).map_err(|e| AppError::BadRequest(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let history = parse_history(&self.history)
            .map_err(|e| AppError::BadRequest(format!("Invalid history: {}", e)))?;

        Ok(TaskSpec {
            task_id: self.task_id,
            prompt: self.prompt,
            should_plan: self.should_plan,
            max_steps: self.preferences.max_steps,
            language: self.preferences.language,
            tools,
            history,
            llm: self.llm_config,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub(crate) async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<CreateTaskResponse>, AppError> {
    let spec = req.into_spec()?;
    let task_id = spec.task_id.clone();
    let prompt = spec.prompt.clone();

    info!(task_id = %task_id, tools = spec.tools.len(), "Creating task");

    let agent = state.factory.build(spec)?;
    // 같은 id의 기존 task는 교체되면서 종료된다
    state.registry.create_boxed(task_id.clone(), agent).await?;
    state.registry.run(&task_id, prompt).await?;

    Ok(Json(CreateTaskResponse { task_id }))
}

pub(crate) async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskInfo>> {
    Json(state.registry.list().await)
}

pub(crate) async fn terminate_task(
    State(state): State<AppState>,
    Json(req): Json<TerminateRequest>,
) -> Json<Value> {
    let task_id = req.task_id;
    if !state.registry.terminate(&task_id).await {
        return Json(json!({"message": format!("Task {} not found", task_id)}));
    }

    Json(json!({
        "message": format!("Task {} terminated successfully", task_id),
        "task_id": task_id,
    }))
}

async fn task_events(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    event_response(&state, &task_id)
}

/// `scope/task_id` 형태의 id (조직 단위 구분 등)
async fn scoped_task_events(
    State(state): State<AppState>,
    Path((scope, task_id)): Path<(String, String)>,
) -> impl IntoResponse {
    event_response(&state, &format!("{}/{}", scope, task_id))
}

fn event_response(state: &AppState, task_id: &str) -> impl IntoResponse {
    let stream = sse_stream(state, task_id);
    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(stream),
    )
}

pub(crate) fn sse_stream(
    state: &AppState,
    task_id: &str,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    state
        .registry
        .subscribe(task_id)
        .map(|item| Ok(to_sse_event(&item)))
}

/// 스트림 항목을 SSE 프레임으로
///
/// 페이로드가 없는 항목(heartbeat)은 주석 프레임이 됩니다.
pub(crate) fn to_sse_event(item: &StreamItem) -> Event {
    let Some(payload) = item.to_json() else {
        return Event::default().comment("heartbeat");
    };
    let event = Event::default().data(payload.to_string());
    match item {
        StreamItem::Error { .. } => event.event("error"),
        _ => event,
    }
}
