//! TaskRegistry 통합 테스트

use async_trait::async_trait;
use futures::StreamExt;
use pilot_agent::{AgentConfig, AgentCore, AgentHooks};
use pilot_foundation::config::StreamSettings;
use pilot_foundation::event::names;
use pilot_foundation::{Error, Event, LlmClient, LlmResponse, Message, Result, ToolChoice};
use pilot_task::{StreamItem, TaskRegistry, TaskStatus};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Doubles
// ============================================================================

struct SilentLlm;

#[async_trait]
impl LlmClient for SilentLlm {
    async fn ask(&self, _messages: &[Message], _system: Option<&str>) -> Result<String> {
        Ok(String::new())
    }

    async fn ask_tool(
        &self,
        _messages: &[Message],
        _system: Option<&str>,
        _tools: &[Value],
        _tool_choice: ToolChoice,
    ) -> Result<LlmResponse> {
        Err(Error::Llm("not scripted".to_string()))
    }

    fn total_input_tokens(&self) -> u64 {
        0
    }

    fn total_completion_tokens(&self) -> u64 {
        0
    }
}

/// 매 step "ok"를 돌려주는 에이전트
struct EchoAgent {
    core: AgentCore,
}

impl EchoAgent {
    fn new(max_steps: u32) -> Self {
        let config = AgentConfig::new("echo").with_max_steps(max_steps);
        Self {
            core: AgentCore::new(config, Arc::new(SilentLlm)),
        }
    }
}

#[async_trait]
impl AgentHooks for EchoAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn think(&mut self) -> Result<bool> {
        Ok(true)
    }

    async fn act(&mut self) -> Result<String> {
        Ok("ok".to_string())
    }
}

/// prepare에서 자원을 잡고 cleanup에서 놓는 에이전트
///
/// 첫 act에서 `entered`를 알리고 `gate`가 열릴 때까지 기다립니다.
struct GatedAgent {
    core: AgentCore,
    owner: String,
    resources: Arc<Mutex<HashSet<String>>>,
    entered: Arc<Notify>,
    gate: Arc<Notify>,
    waited: bool,
}

impl GatedAgent {
    fn new(owner: &str, resources: Arc<Mutex<HashSet<String>>>) -> Self {
        let config = AgentConfig::new("gated").with_max_steps(2);
        Self {
            core: AgentCore::new(config, Arc::new(SilentLlm)),
            owner: owner.to_string(),
            resources,
            entered: Arc::new(Notify::new()),
            gate: Arc::new(Notify::new()),
            waited: false,
        }
    }
}

#[async_trait]
impl AgentHooks for GatedAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn prepare(&mut self) -> Result<()> {
        self.resources.lock().insert(self.owner.clone());
        Ok(())
    }

    async fn think(&mut self) -> Result<bool> {
        Ok(true)
    }

    async fn act(&mut self) -> Result<String> {
        if !self.waited {
            self.waited = true;
            self.entered.notify_one();
            self.gate.notified().await;
        }
        Ok("ok".to_string())
    }

    async fn cleanup(&mut self) -> Result<()> {
        self.resources.lock().remove(&self.owner);
        Ok(())
    }
}

fn settings(retention_secs: u64) -> StreamSettings {
    StreamSettings {
        retention_secs,
        ..Default::default()
    }
}

async fn run_to_end(registry: &TaskRegistry, task_id: &str, max_steps: u32) -> String {
    registry.create(task_id, EchoAgent::new(max_steps)).await.unwrap();
    let handle = registry.run(task_id, "hello").await.unwrap();
    handle.await.unwrap().unwrap()
}

// ============================================================================
// Run
// ============================================================================

#[tokio::test]
async fn test_run_until_max_steps() {
    let registry = TaskRegistry::new(settings(3600));
    let output = run_to_end(&registry, "t1", 3).await;

    assert!(output.contains("Step 3: ok"));

    let history = registry.history("t1").await.unwrap();
    assert!(history.iter().enumerate().all(|(i, r)| r.index == i));
    assert_eq!(history.first().map(|r| r.name.as_str()), Some(names::START));
    assert_eq!(history.last().map(|r| r.name.as_str()), Some(names::COMPLETE));
    assert_eq!(
        history.iter().filter(|r| r.name == names::STEP_MAX_REACHED).count(),
        1
    );

    let info = registry.get("t1").await.unwrap();
    assert_eq!(info.status, TaskStatus::Completed);
    assert_eq!(info.request.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_run_rejects_unknown_and_restart() {
    let registry = TaskRegistry::new(settings(3600));

    let err = registry.run("missing", "hi").await.unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));

    run_to_end(&registry, "t1", 1).await;
    let err = registry.run("t1", "again").await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn test_terminate_before_first_step() {
    let registry = TaskRegistry::new(settings(3600));
    registry.create("t1", EchoAgent::new(5)).await.unwrap();

    assert!(registry.terminate("t1").await);
    assert!(!registry.terminate("missing").await);

    let handle = registry.run("t1", "hello").await.unwrap();
    handle.await.unwrap().unwrap();

    let history = registry.history("t1").await.unwrap();
    assert_eq!(history.last().map(|r| r.name.as_str()), Some(names::TERMINATED));
    assert!(history.iter().all(|r| r.name != names::STEP_START));
    assert_eq!(
        registry.get("t1").await.map(|i| i.status),
        Some(TaskStatus::Terminated)
    );
}

#[tokio::test]
async fn test_create_replaces_and_terminates_existing() {
    let registry = TaskRegistry::new(settings(3600));

    let first = EchoAgent::new(5);
    let first_handle = first.core().terminate_handle();
    registry.create("t1", first).await.unwrap();
    registry.create("t1", EchoAgent::new(5)).await.unwrap();

    assert!(first_handle.is_requested());
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_replaced_run_leaves_successor_untouched() {
    let registry = TaskRegistry::new(settings(3600));
    let resources = Arc::new(Mutex::new(HashSet::new()));

    let old = GatedAgent::new("old", resources.clone());
    let (old_entered, old_gate) = (old.entered.clone(), old.gate.clone());
    registry.create("t1", old).await.unwrap();
    let old_run = registry.run("t1", "first").await.unwrap();
    old_entered.notified().await;

    let new = GatedAgent::new("new", resources.clone());
    let (new_entered, new_gate) = (new.entered.clone(), new.gate.clone());
    registry.create("t1", new).await.unwrap();
    let new_run = registry.run("t1", "second").await.unwrap();
    new_entered.notified().await;

    // 교체된 실행이 끝나도 새 task의 상태 / 기록 / 자원은 그대로
    old_gate.notify_one();
    old_run.await.unwrap().unwrap();

    assert_eq!(*resources.lock(), HashSet::from(["new".to_string()]));
    let info = registry.get("t1").await.unwrap();
    assert_eq!(info.status, TaskStatus::Running);
    assert_eq!(info.request.as_deref(), Some("second"));

    let history = registry.history("t1").await.unwrap();
    assert!(history.iter().all(|r| r.name != names::TERMINATED));
    assert_eq!(registry.len().await, 1);

    new_gate.notify_one();
    new_run.await.unwrap().unwrap();

    assert!(resources.lock().is_empty());
    assert_eq!(
        registry.get("t1").await.map(|i| i.status),
        Some(TaskStatus::Completed)
    );
    let history = registry.history("t1").await.unwrap();
    assert!(history.iter().enumerate().all(|(i, r)| r.index == i));
    assert_eq!(history.iter().filter(|r| r.name == names::START).count(), 1);
    assert!(history.iter().all(|r| r.name != names::TERMINATED));
    assert_eq!(history.last().map(|r| r.name.as_str()), Some(names::COMPLETE));
}

#[tokio::test]
async fn test_list_newest_first() {
    let registry = TaskRegistry::new(settings(3600));
    registry.create("a", EchoAgent::new(1)).await.unwrap();
    registry.create("b", EchoAgent::new(1)).await.unwrap();

    let ids: Vec<_> = registry.list().await.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["b", "a"]);

    assert!(registry.remove("a").await);
    assert!(!registry.remove("a").await);
    assert_eq!(registry.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_finished_task_removed_after_retention() {
    let registry = TaskRegistry::new(settings(60));
    run_to_end(&registry, "t1", 1).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(registry.get("t1").await.is_some());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(registry.get("t1").await.is_none());
}

// ============================================================================
// Stream
// ============================================================================

#[tokio::test]
async fn test_unknown_task_yields_single_error() {
    let registry = TaskRegistry::default();
    let items: Vec<_> = registry.subscribe("missing").collect().await;

    assert_eq!(items, vec![StreamItem::error("Task not found")]);
}

#[tokio::test]
async fn test_subscribe_replays_and_closes_on_completion() {
    let registry = TaskRegistry::new(settings(3600));
    run_to_end(&registry, "t1", 2).await;
    let history = registry.history("t1").await.unwrap();

    let items: Vec<_> = registry.subscribe("t1").collect().await;
    assert_eq!(items.len(), history.len());

    let replay: Vec<_> = registry.subscribe_from("t1", 2).collect().await;
    assert_eq!(replay.len(), history.len() - 2);
    match (&replay[0], replay.last()) {
        (StreamItem::Progress(first), Some(StreamItem::Progress(last))) => {
            assert_eq!(first.index, 2);
            assert_eq!(last.name, names::COMPLETE);
        }
        other => panic!("unexpected items: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_once_per_idle_interval() {
    let registry = TaskRegistry::new(settings(3600));
    registry.create("idle", EchoAgent::new(1)).await.unwrap();

    let mut stream = Box::pin(registry.subscribe("idle"));
    let mut items = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(12), async {
        while let Some(item) = stream.next().await {
            items.push(item);
        }
    })
    .await;

    assert_eq!(items, vec![StreamItem::Heartbeat, StreamItem::Heartbeat]);
}

#[tokio::test(start_paused = true)]
async fn test_no_heartbeat_while_events_flow() {
    let registry = TaskRegistry::new(settings(3600));
    let agent = EchoAgent::new(1);
    let bus = agent.core().bus().clone();
    registry.create("busy", agent).await.unwrap();

    tokio::spawn(async move {
        for i in 0..8 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            bus.emit(Event::new("agent:test:tick", 0, json!({"i": i})));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        bus.emit(Event::new(names::COMPLETE, 0, json!({})));
    });

    let items: Vec<_> = registry.subscribe("busy").collect().await;
    assert_eq!(items.len(), 9);
    assert!(items.iter().all(|i| !i.is_heartbeat()));
}
