//! Agent Core - 모든 에이전트가 공유하는 상태
//!
//! 식별 정보, 상태, step 카운터, 메모리, 이벤트 버스, LLM 클라이언트를 한곳에 모읍니다.
//! 구체 에이전트는 `AgentCore`를 하나 품고 `AgentHooks`로 동작만 정의합니다.
//!
//! ## 사용법
//!
//! ```ignore
//! use pilot_agent::{AgentConfig, AgentCore};
//!
//! let core = AgentCore::new(AgentConfig::new("general").with_max_steps(10), llm);
//! let handle = core.terminate_handle();
//!
//! // 다른 태스크에서
//! handle.terminate();
//! ```

use crate::state::AgentState;
use pilot_foundation::config::AgentSettings;
use pilot_foundation::event::names;
use pilot_foundation::{EmitOptions, Error, Event, EventBus, LlmClient, Memory, Message, Result};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// 확장 필드 최대 개수
pub const MAX_EXTENSIONS: usize = 32;

// ============================================================================
// AgentConfig
// ============================================================================

/// 에이전트 생성 설정
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// 에이전트 이름
    pub name: String,

    /// 설명
    pub description: String,

    /// 최대 step 수
    pub max_steps: u32,

    /// stuck 판정 기준 (이전 assistant 메시지 중 같은 내용의 수)
    pub duplicate_threshold: usize,

    /// 메모리 최대 메시지 수
    pub max_messages: usize,

    /// 요청을 받으면 step 전에 plan을 호출할지
    pub should_plan: bool,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 설정 파일의 기본값으로 생성
    pub fn from_settings(name: impl Into<String>, settings: &AgentSettings) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            max_steps: settings.max_steps,
            duplicate_threshold: settings.duplicate_threshold,
            max_messages: settings.max_messages,
            should_plan: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_duplicate_threshold(mut self, threshold: usize) -> Self {
        self.duplicate_threshold = threshold;
        self
    }

    pub fn with_planning(mut self, should_plan: bool) -> Self {
        self.should_plan = should_plan;
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let settings = AgentSettings::default();
        Self {
            name: "agent".to_string(),
            description: String::new(),
            max_steps: settings.max_steps,
            duplicate_threshold: settings.duplicate_threshold,
            max_messages: settings.max_messages,
            should_plan: false,
        }
    }
}

// ============================================================================
// TerminateHandle
// ============================================================================

/// 외부에서 종료를 요청하는 핸들
///
/// 에이전트가 실행 중이어도 잠금 없이 사용할 수 있습니다.
/// 플래그는 다음 step 반복의 시작에서 확인됩니다.
#[derive(Clone)]
pub struct TerminateHandle {
    flag: Arc<AtomicBool>,
    step: Arc<AtomicU32>,
    bus: Arc<EventBus>,
}

impl TerminateHandle {
    /// 종료 요청 (TERMINATING 이벤트 발행)
    pub fn terminate(&self) {
        self.flag.store(true, Ordering::SeqCst);
        let step = self.step.load(Ordering::SeqCst);
        self.bus.emit(Event::new(names::TERMINATING, step, json!({})));
        info!(step, "Termination requested");
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TerminateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminateHandle")
            .field("requested", &self.is_requested())
            .finish()
    }
}

// ============================================================================
// AgentCore
// ============================================================================

/// 에이전트 공통 상태
pub struct AgentCore {
    /// 이름
    pub name: String,

    /// 설명
    pub description: String,

    state: AgentState,

    /// 현재 step (발행되는 이벤트의 step 값)
    current_step: Arc<AtomicU32>,

    /// 최대 step 수
    pub max_steps: u32,

    /// 요청 수신 시 plan 호출 여부
    pub should_plan: bool,

    /// stuck 판정 기준
    pub duplicate_threshold: usize,

    /// 대화 기록
    pub memory: Memory,

    /// 시스템 프롬프트
    pub system_prompt: Option<String>,

    /// 다음 step 안내 프롬프트 (stuck 처리 시 앞에 덧붙여짐)
    pub next_step_prompt: Option<String>,

    should_terminate: Arc<AtomicBool>,
    llm: Arc<dyn LlmClient>,
    bus: Arc<EventBus>,

    // 직전 step 종료 시점의 누적 토큰
    pre_step_input_tokens: u64,
    pre_step_completion_tokens: u64,

    /// 래핑된 메서드별 호출 횟수
    invocation_counts: HashMap<String, u64>,

    /// 선언된 확장 필드 (최대 MAX_EXTENSIONS개)
    extensions: BTreeMap<String, Value>,
}

impl AgentCore {
    /// 새 코어 생성 (전용 이벤트 버스 시작)
    ///
    /// 버스 디스패치 태스크가 시작되므로 tokio 런타임 안에서 호출해야 합니다.
    pub fn new(config: AgentConfig, llm: Arc<dyn LlmClient>) -> Self {
        Self::with_bus(config, llm, Arc::new(EventBus::new()))
    }

    pub fn with_bus(config: AgentConfig, llm: Arc<dyn LlmClient>, bus: Arc<EventBus>) -> Self {
        Self {
            name: config.name,
            description: config.description,
            state: AgentState::Idle,
            current_step: Arc::new(AtomicU32::new(0)),
            max_steps: config.max_steps,
            should_plan: config.should_plan,
            duplicate_threshold: config.duplicate_threshold,
            memory: Memory::with_limit(config.max_messages),
            system_prompt: None,
            next_step_prompt: None,
            should_terminate: Arc::new(AtomicBool::new(false)),
            llm,
            bus,
            pre_step_input_tokens: 0,
            pre_step_completion_tokens: 0,
            invocation_counts: HashMap::new(),
            extensions: BTreeMap::new(),
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: AgentState) {
        self.state = state;
    }

    pub fn current_step(&self) -> u32 {
        self.current_step.load(Ordering::SeqCst)
    }

    pub(crate) fn set_current_step(&mut self, step: u32) {
        self.current_step.store(step, Ordering::SeqCst);
    }

    pub fn should_terminate(&self) -> bool {
        self.should_terminate.load(Ordering::SeqCst)
    }

    /// 루프 안에서 종료 표시 (terminate 도구 등)
    pub fn mark_terminate(&self) {
        self.should_terminate.store(true, Ordering::SeqCst);
    }

    /// 외부 종료 요청 (TERMINATING 이벤트 발행)
    pub fn terminate(&self) {
        self.terminate_handle().terminate();
    }

    pub fn terminate_handle(&self) -> TerminateHandle {
        TerminateHandle {
            flag: self.should_terminate.clone(),
            step: self.current_step.clone(),
            bus: self.bus.clone(),
        }
    }

    // ========================================================================
    // Dependencies
    // ========================================================================

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// 현재 step으로 이벤트 발행
    pub fn emit(&self, name: &str, content: Value) -> bool {
        self.emit_with(name, content, EmitOptions::default())
    }

    pub fn emit_with(&self, name: &str, content: Value, options: EmitOptions) -> bool {
        self.bus
            .emit(Event::with_options(name, self.current_step(), content, options))
    }

    // ========================================================================
    // Memory
    // ========================================================================

    /// 메모리에 메시지 추가 (MEMORY_ADDED 발행)
    pub fn add_message(&mut self, message: Message) {
        let role = message.role();
        let payload = serde_json::to_value(&message).unwrap_or(Value::Null);
        self.memory.add(message);
        self.emit(names::MEMORY_ADDED, json!({"role": role.as_str(), "message": payload}));
    }

    /// 역할 이름으로 메시지 추가
    ///
    /// 알 수 없는 역할은 부작용 없이 거부됩니다.
    pub fn add_role_message(&mut self, role: &str, content: &str, tool_call_id: Option<&str>) -> Result<()> {
        let message = Message::from_role(role.parse()?, content, tool_call_id)?;
        self.add_message(message);
        Ok(())
    }

    // ========================================================================
    // Token accounting
    // ========================================================================

    /// 직전 측정 이후의 토큰 증가분을 계산하고 기준점을 갱신
    ///
    /// 반환: `{input, completion, total_input, total_completion}`
    pub(crate) fn take_token_delta(&mut self) -> Value {
        let total_input = self.llm.total_input_tokens();
        let total_completion = self.llm.total_completion_tokens();
        let delta = json!({
            "input": total_input.saturating_sub(self.pre_step_input_tokens),
            "completion": total_completion.saturating_sub(self.pre_step_completion_tokens),
            "total_input": total_input,
            "total_completion": total_completion,
        });
        self.pre_step_input_tokens = total_input;
        self.pre_step_completion_tokens = total_completion;
        delta
    }

    /// 누적 토큰 `{total_input_tokens, total_completion_tokens}`
    pub(crate) fn token_totals(&self) -> Value {
        json!({
            "total_input_tokens": self.llm.total_input_tokens(),
            "total_completion_tokens": self.llm.total_completion_tokens(),
        })
    }

    // ========================================================================
    // Invocation counters
    // ========================================================================

    /// 메서드 호출 횟수 증가 후 반환 (1부터)
    pub(crate) fn next_invocation(&mut self, method: &str) -> u64 {
        let count = self.invocation_counts.entry(method.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn invocation_count(&self, method: &str) -> u64 {
        self.invocation_counts.get(method).copied().unwrap_or(0)
    }

    // ========================================================================
    // Extensions
    // ========================================================================

    /// 확장 필드 설정
    pub fn set_extension(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        if !self.extensions.contains_key(&key) && self.extensions.len() >= MAX_EXTENSIONS {
            return Err(Error::InvalidRequest(format!(
                "too many agent extensions (max {}), rejected '{}'",
                MAX_EXTENSIONS, key
            )));
        }
        debug!(agent = %self.name, extension = %key, "Setting agent extension");
        self.extensions.insert(key, value);
        Ok(())
    }

    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    pub fn extensions(&self) -> &BTreeMap<String, Value> {
        &self.extensions
    }
}

impl std::fmt::Debug for AgentCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCore")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("current_step", &self.current_step())
            .field("max_steps", &self.max_steps)
            .field("messages", &self.memory.len())
            .finish()
    }
}
