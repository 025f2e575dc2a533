//! 테스트용 더블: 스크립트 LLM, 스크립트 에이전트, 메모리 샌드박스, 이벤트 기록기

use crate::core::{AgentConfig, AgentCore};
use crate::hooks::AgentHooks;
use async_trait::async_trait;
use parking_lot::Mutex;
use pilot_foundation::event::names;
use pilot_foundation::{
    CommandOutput, Error, Event, EventBus, FnHandler, LlmClient, LlmResponse, Message, Result,
    Sandbox, ToolChoice,
};
use pilot_sandbox::SandboxProvider;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Event log
// ============================================================================

#[derive(Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.0.lock().iter().map(|e| e.name.clone()).collect()
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        self.0.lock().iter().filter(|e| e.name == name).count()
    }
}

pub(crate) fn collect_events(bus: &EventBus) -> EventLog {
    let log = EventLog::default();
    let sink = log.clone();
    bus.subscribe(
        names::MATCH_ALL,
        Arc::new(FnHandler::new("test-log", move |e: &Event| {
            sink.0.lock().push(e.clone());
            Ok(())
        })),
    )
    .unwrap();
    log
}

// ============================================================================
// Scripted LLM
// ============================================================================

/// 정해진 응답을 순서대로 돌려주는 LLM
#[derive(Default)]
pub(crate) struct ScriptedLlm {
    responses: Mutex<VecDeque<LlmResponse>>,
    answers: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<Message>>>,
    input: AtomicU64,
    completion: AtomicU64,
}

impl ScriptedLlm {
    pub(crate) fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    pub(crate) fn with_answers(self, answers: Vec<&str>) -> Self {
        *self.answers.lock() = answers.into_iter().map(String::from).collect();
        self
    }

    pub(crate) fn add_usage(&self, input: u64, completion: u64) {
        self.input.fetch_add(input, Ordering::SeqCst);
        self.completion.fetch_add(completion, Ordering::SeqCst);
    }

    pub(crate) fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn ask(&self, messages: &[Message], _system: Option<&str>) -> Result<String> {
        self.requests.lock().push(messages.to_vec());
        self.add_usage(10, 5);
        Ok(self.answers.lock().pop_front().unwrap_or_default())
    }

    async fn ask_tool(
        &self,
        messages: &[Message],
        _system: Option<&str>,
        _tools: &[Value],
        _tool_choice: ToolChoice,
    ) -> Result<LlmResponse> {
        self.requests.lock().push(messages.to_vec());
        self.add_usage(10, 5);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Llm("script exhausted".to_string()))
    }

    fn total_input_tokens(&self) -> u64 {
        self.input.load(Ordering::SeqCst)
    }

    fn total_completion_tokens(&self) -> u64 {
        self.completion.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Scripted agent
// ============================================================================

/// step마다 할 일
pub(crate) enum Script {
    /// assistant 메시지만 남기고 행동 없음
    Say(String),
    /// act에서 주어진 결과 반환
    Act(String),
    /// act에서 종료 표시
    Terminate,
    /// think 실패
    Fail(String),
}

pub(crate) struct ScriptedAgent {
    core: AgentCore,
    script: VecDeque<Script>,
    pending: Option<Script>,
}

impl ScriptedAgent {
    pub(crate) fn new(max_steps: u32, script: Vec<Script>) -> Self {
        let config = AgentConfig::new("scripted").with_max_steps(max_steps);
        let mut core = AgentCore::new(config, Arc::new(ScriptedLlm::default()));
        core.next_step_prompt = Some("keep going".to_string());
        Self {
            core,
            script: script.into(),
            pending: None,
        }
    }
}

#[async_trait]
impl AgentHooks for ScriptedAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn think(&mut self) -> Result<bool> {
        match self.script.pop_front() {
            Some(Script::Say(text)) => {
                self.core.add_message(Message::assistant(text));
                Ok(false)
            }
            Some(Script::Fail(reason)) => Err(Error::Llm(reason)),
            Some(other) => {
                self.pending = Some(other);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn act(&mut self) -> Result<String> {
        match self.pending.take() {
            Some(Script::Act(output)) => Ok(output),
            Some(Script::Terminate) => {
                self.core.mark_terminate();
                Ok("terminated".to_string())
            }
            _ => Ok(String::new()),
        }
    }
}

// ============================================================================
// Sandbox doubles
// ============================================================================

/// 명령을 기록하고 파일을 메모리에 두는 샌드박스
pub(crate) struct MemorySandbox {
    id: String,
    root: PathBuf,
    files: Mutex<HashMap<String, String>>,
    commands: Mutex<Vec<String>>,
}

impl MemorySandbox {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            root: PathBuf::from("/tmp/pilot-test").join(id),
            files: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl Sandbox for MemorySandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn work_dir(&self) -> &str {
        "/workspace"
    }

    fn host_workspace(&self) -> &Path {
        &self.root
    }

    async fn run_command(&self, command: &str, _timeout: Option<Duration>) -> Result<CommandOutput> {
        self.commands.lock().push(command.to_string());
        Ok(CommandOutput {
            stdout: format!("ran: {}", command),
            ..Default::default()
        })
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Sandbox(format!("No such file: {}", path)))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.files.lock().insert(path.to_string(), content.to_string());
        Ok(())
    }
}

/// 생성/삭제를 기록하는 샌드박스 공급자
#[derive(Default)]
pub(crate) struct FakeProvider {
    pub(crate) created: Mutex<Vec<String>>,
    pub(crate) deleted: Mutex<Vec<String>>,
    pub(crate) sandboxes: Mutex<HashMap<String, Arc<MemorySandbox>>>,
    pub(crate) fail: bool,
}

impl FakeProvider {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn sandbox(&self, id: &str) -> Option<Arc<MemorySandbox>> {
        self.sandboxes.lock().get(id).cloned()
    }
}

#[async_trait]
impl SandboxProvider for FakeProvider {
    async fn create(&self, id: &str) -> Result<Arc<dyn Sandbox>> {
        if self.fail {
            return Err(Error::Sandbox("Docker is not available".to_string()));
        }
        self.created.lock().push(id.to_string());
        let sandbox = Arc::new(MemorySandbox::new(id));
        self.sandboxes.lock().insert(id.to_string(), sandbox.clone());
        Ok(sandbox)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.deleted.lock().push(id.to_string());
        self.sandboxes.lock().remove(id);
        Ok(())
    }
}
