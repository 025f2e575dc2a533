//! Task Registry - task 수명 관리
//!
//! task id마다 에이전트 하나, 이벤트 history 하나, 종료 핸들 하나를 묶어 둡니다.
//! 실행이 끝난 task는 `retention` 동안 남아 있다가 자동으로 제거됩니다.
//!
//! ## 사용법
//!
//! ```ignore
//! let registry = TaskRegistry::new(config.stream.clone());
//!
//! registry.create("task-1", agent).await?;
//! registry.run("task-1", "Summarize README.md").await?;
//!
//! let stream = registry.subscribe("task-1");
//! ```

use crate::history::{ProgressRecorder, TaskHistory};
use chrono::{DateTime, Utc};
use pilot_agent::{AgentHooks, TerminateHandle};
use pilot_foundation::config::StreamSettings;
use pilot_foundation::event::names;
use pilot_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ============================================================================
// Task status
// ============================================================================

/// Task 진행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 등록만 됨
    Created,
    Running,
    Completed,
    Terminated,
    Failed,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Terminated | Self::Failed)
    }
}

/// 목록 조회용 요약
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub request: Option<String>,
}

// ============================================================================
// Entry
// ============================================================================

type SharedAgent = Arc<Mutex<Box<dyn AgentHooks>>>;

/// 등록된 task 하나
struct TaskEntry {
    /// 같은 id로 다시 등록될 때 구분하기 위한 세대 번호
    generation: u64,
    created_at: DateTime<Utc>,
    status: Arc<parking_lot::Mutex<TaskStatus>>,
    request: Option<String>,
    history: TaskHistory,
    terminate: TerminateHandle,
    agent: SharedAgent,
}

impl TaskEntry {
    fn info(&self, id: &str) -> TaskInfo {
        TaskInfo {
            id: id.to_string(),
            created_at: self.created_at,
            status: *self.status.lock(),
            request: self.request.clone(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Task Registry - 실행 중/완료된 task 모음
#[derive(Clone)]
pub struct TaskRegistry {
    /// All tasks by ID
    tasks: Arc<RwLock<HashMap<String, TaskEntry>>>,

    /// 세대 카운터
    generations: Arc<AtomicU64>,

    /// 스트림/보존 설정
    settings: Arc<StreamSettings>,
}

impl TaskRegistry {
    /// Create a new registry
    pub fn new(settings: StreamSettings) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Register an agent under `task_id`
    ///
    /// 에이전트 버스에 progress 기록기를 먼저 붙이므로 이후 발행되는 이벤트는 모두 history에 남습니다.
    /// 같은 id가 이미 있으면 기존 task를 종료하고 교체합니다.
    pub async fn create<A>(&self, task_id: impl Into<String>, agent: A) -> Result<TaskInfo>
    where
        A: AgentHooks + 'static,
    {
        self.create_boxed(task_id, Box::new(agent)).await
    }

    /// 이미 박싱된 에이전트 등록
    pub async fn create_boxed(
        &self,
        task_id: impl Into<String>,
        agent: Box<dyn AgentHooks>,
    ) -> Result<TaskInfo> {
        let task_id = task_id.into();
        if task_id.trim().is_empty() {
            return Err(Error::InvalidRequest("task_id must not be empty".to_string()));
        }

        let history = TaskHistory::new();
        agent.core().bus().subscribe(
            names::MATCH_ALL,
            Arc::new(ProgressRecorder::new(task_id.clone(), history.clone())),
        )?;

        let entry = TaskEntry {
            generation: self.generations.fetch_add(1, Ordering::SeqCst),
            created_at: Utc::now(),
            status: Arc::new(parking_lot::Mutex::new(TaskStatus::Created)),
            request: None,
            history,
            terminate: agent.core().terminate_handle(),
            agent: Arc::new(Mutex::new(agent)),
        };
        let info = entry.info(&task_id);

        let replaced = self.tasks.write().await.insert(task_id.clone(), entry);
        if let Some(old) = replaced {
            warn!(task_id = %task_id, "Replacing existing task");
            old.terminate.terminate();
        }

        info!(task_id = %task_id, "Task created");
        Ok(info)
    }

    /// Start the agent run in the background
    ///
    /// 실행이 끝나면 에이전트 cleanup, 버스 정지(남은 이벤트 기록) 순서로 마무리하고
    /// `retention` 뒤에 task를 제거합니다. 반환된 핸들은 실행 결과를 돌려줍니다.
    pub async fn run(
        &self,
        task_id: &str,
        request: impl Into<String>,
    ) -> Result<JoinHandle<Result<String>>> {
        let request = request.into();

        let (agent, status, generation) = {
            let mut tasks = self.tasks.write().await;
            let entry = tasks
                .get_mut(task_id)
                .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;

            let mut status = entry.status.lock();
            if *status != TaskStatus::Created {
                return Err(Error::InvalidState(format!(
                    "Task {} already started",
                    task_id
                )));
            }
            *status = TaskStatus::Running;
            drop(status);

            entry.request = Some(request.clone());
            (entry.agent.clone(), entry.status.clone(), entry.generation)
        };

        let registry = self.clone();
        let task_id = task_id.to_string();

        let handle = tokio::spawn(async move {
            let mut agent = agent.lock().await;
            let result = pilot_agent::run(&mut **agent, Some(request)).await;

            let outcome = match &result {
                Ok(_) if agent.core().should_terminate() => TaskStatus::Terminated,
                Ok(_) => TaskStatus::Completed,
                Err(e) => {
                    // 시작 전에 거부된 실행은 에러 이벤트가 없으므로 여기서 남긴다
                    if matches!(e, Error::InvalidState(_)) {
                        agent.core().emit(names::ERROR, json!({"error": e.to_string()}));
                    }
                    TaskStatus::Failed
                }
            };

            if let Err(e) = agent.cleanup().await {
                warn!(task_id = %task_id, error = %e, "Agent cleanup failed");
            }
            agent.core().bus().stop().await;
            *status.lock() = outcome;
            drop(agent);

            info!(task_id = %task_id, status = ?outcome, "Task finished");
            registry.schedule_removal(task_id, generation);
            result
        });

        Ok(handle)
    }

    /// `retention` 뒤 task 제거 (그 사이 같은 id로 재등록되었으면 건드리지 않음)
    fn schedule_removal(&self, task_id: String, generation: u64) {
        let registry = self.clone();
        let retention = self.settings.retention();

        tokio::spawn(async move {
            tokio::time::sleep(retention).await;

            let mut tasks = registry.tasks.write().await;
            if tasks.get(&task_id).map(|e| e.generation) == Some(generation) {
                tasks.remove(&task_id);
                debug!(task_id = %task_id, "Expired task removed");
            }
        });
    }

    /// Request termination
    ///
    /// task가 없으면 `false`.
    pub async fn terminate(&self, task_id: &str) -> bool {
        let tasks = self.tasks.read().await;
        match tasks.get(task_id) {
            Some(entry) => {
                entry.terminate.terminate();
                info!(task_id = %task_id, "Task termination requested");
                true
            }
            None => false,
        }
    }

    /// 모든 task 종료 요청 (서버 종료 시)
    pub async fn terminate_all(&self) -> usize {
        let tasks = self.tasks.read().await;
        for entry in tasks.values() {
            if !entry.status.lock().is_finished() {
                entry.terminate.terminate();
            }
        }
        tasks.len()
    }

    /// Remove a task immediately
    pub async fn remove(&self, task_id: &str) -> bool {
        self.tasks.write().await.remove(task_id).is_some()
    }

    /// Get task summary
    pub async fn get(&self, task_id: &str) -> Option<TaskInfo> {
        self.tasks.read().await.get(task_id).map(|e| e.info(task_id))
    }

    /// List tasks, newest first
    pub async fn list(&self) -> Vec<TaskInfo> {
        let tasks = self.tasks.read().await;
        let mut entries: Vec<_> = tasks.iter().collect();
        entries.sort_by(|(_, a), (_, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.generation.cmp(&a.generation))
        });
        entries.into_iter().map(|(id, e)| e.info(id)).collect()
    }

    /// 기록된 progress 전체
    pub async fn history(&self, task_id: &str) -> Option<Vec<crate::ProgressRecord>> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .map(|e| e.history.snapshot())
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// 스트림용: history 핸들과 세대 번호
    pub(crate) async fn history_handle(&self, task_id: &str) -> Option<(TaskHistory, u64)> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .map(|e| (e.history.clone(), e.generation))
    }

    /// 스트림용: 같은 세대의 task가 아직 등록되어 있는지
    pub(crate) async fn is_current(&self, task_id: &str, generation: u64) -> bool {
        self.tasks.read().await.get(task_id).map(|e| e.generation) == Some(generation)
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(StreamSettings::default())
    }
}
