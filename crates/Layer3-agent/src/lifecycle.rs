//! Agent Lifecycle - 상태 가드, 이벤트 래퍼, ReAct step, run 루프
//!
//! 모든 함수는 `AgentHooks`를 구현한 에이전트 위에서 동작합니다.
//!
//! ## 이벤트 순서
//!
//! ```text
//! start
//! prepare:start → prepare:complete
//! state:change (IDLE → RUNNING)
//!   memory:added (요청) → [plan:start → plan:complete]
//!   step:start
//!     think:start → think:token:count → think:complete
//!     [act:start → act:token:count → act:complete]
//!   step:complete
//!   [state:stuck_detected → state:stuck_handled]
//!   ...
//!   [step_max_reached]
//! state:change (RUNNING → IDLE)
//! complete | terminated | error
//! ```

use crate::core::AgentCore;
use crate::hooks::AgentHooks;
use crate::state::AgentState;
use futures::future::BoxFuture;
use pilot_foundation::event::names;
use pilot_foundation::{Error, Message, Result, Role};
use serde::Serialize;
use serde_json::{json, Value};
use std::borrow::Cow;
use tracing::{error, info, warn};

/// stuck 감지 시 다음 step 안내 앞에 붙는 문구
pub const STUCK_PROMPT: &str = "Observed duplicate responses. Consider new strategies and avoid repeating ineffective paths already attempted.";

/// think 결과 행동이 필요 없을 때의 step 결과
pub const NO_ACTION_RESULT: &str = "Thinking complete - no action needed";

/// step이 하나도 실행되지 않았을 때의 run 결과
pub const NO_STEPS_RESULT: &str = "No steps executed";

// ============================================================================
// WrapperEvents - 전/후/에러 이벤트 이름 묶음
// ============================================================================

/// 래핑할 메서드의 이벤트 이름
#[derive(Debug, Clone, Copy)]
pub struct WrapperEvents {
    pub start: &'static str,
    pub complete: &'static str,
    /// 없으면 `{complete}:error`
    pub error: Option<&'static str>,
}

impl WrapperEvents {
    pub const fn new(start: &'static str, complete: &'static str) -> Self {
        Self {
            start,
            complete,
            error: None,
        }
    }

    pub const fn with_error(mut self, error: &'static str) -> Self {
        self.error = Some(error);
        self
    }

    pub fn error_name(&self) -> Cow<'static, str> {
        match self.error {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("{}:error", self.complete)),
        }
    }
}

/// step 래핑 이벤트
pub const STEP_EVENTS: WrapperEvents =
    WrapperEvents::new(names::STEP_START, names::STEP_COMPLETE).with_error(names::STEP_ERROR);

// ============================================================================
// Event wrapper
// ============================================================================

/// 메서드 실행 전후로 이벤트 발행
///
/// - 시작: `{method, count, message: "Executing {method} #{count}"}`
/// - 성공: 위 내용 + `result`, `message: "Completed {method} #{count}"`
/// - 실패: 위 내용 + `error`, `message: "Error in {method} #{count}: {error}"` 후 에러 그대로 반환
///
/// `count`는 메서드별 호출 횟수로 `AgentCore`에 보관됩니다.
pub async fn wrapped<A, T, F>(
    agent: &mut A,
    method: &str,
    events: &WrapperEvents,
    f: F,
) -> Result<T>
where
    A: AgentHooks + ?Sized,
    T: Serialize + Send,
    F: for<'a> FnOnce(&'a mut A) -> BoxFuture<'a, Result<T>> + Send,
{
    let count = agent.core_mut().next_invocation(method);
    let mut data = json!({
        "method": method,
        "count": count,
        "message": format!("Executing {} #{}", method, count),
    });
    agent.core().emit(events.start, data.clone());

    match f(agent).await {
        Ok(result) => {
            data["result"] = serde_json::to_value(&result).unwrap_or(Value::Null);
            data["message"] = json!(format!("Completed {} #{}", method, count));
            agent.core().emit(events.complete, data);
            Ok(result)
        }
        Err(e) => {
            data["error"] = json!(e.to_string());
            data["message"] = json!(format!("Error in {} #{}: {}", method, count, e));
            agent.core().emit(&events.error_name(), data);
            Err(e)
        }
    }
}

// ============================================================================
// State guard
// ============================================================================

/// `new_state`로 전이한 상태에서 `f` 실행 후 항상 이전 상태로 복귀
///
/// 진입 시 `state:change` 하나, 종료 시 복귀 또는 에러 `state:change` 하나를 발행합니다.
/// 실패하면 `ERROR`로의 전이를 알린 뒤 이전 상태로 되돌리고 에러를 그대로 반환합니다.
pub async fn with_state<A, T, F>(agent: &mut A, new_state: AgentState, f: F) -> Result<T>
where
    A: AgentHooks + ?Sized,
    T: Send,
    F: for<'a> FnOnce(&'a mut A) -> BoxFuture<'a, Result<T>> + Send,
{
    let previous = agent.core().state();
    agent.core_mut().set_state(new_state);
    agent.core().emit(
        names::STATE_CHANGE,
        json!({"old_state": previous, "new_state": new_state}),
    );

    let result = f(agent).await;

    let current = agent.core().state();
    let reported = match &result {
        Ok(_) => previous,
        Err(e) => {
            warn!(agent = %agent.core().name, error = %e, "Agent failed in state {}", current);
            AgentState::Error
        }
    };
    agent.core_mut().set_state(previous);
    agent.core().emit(
        names::STATE_CHANGE,
        json!({"old_state": current, "new_state": reported}),
    );

    result
}

// ============================================================================
// Stuck detection
// ============================================================================

/// 마지막 메시지 내용이 이전 assistant 메시지에 기준 이상 반복됐는지
pub fn is_stuck(core: &AgentCore) -> bool {
    if core.memory.len() < 2 {
        return false;
    }
    match core.memory.last() {
        Some(last) if !last.content().is_empty() => {
            core.memory.count_prior_assistant_duplicates() >= core.duplicate_threshold
        }
        _ => false,
    }
}

/// 다음 step 안내 앞에 전략 변경 문구를 덧붙임
pub fn handle_stuck(core: &mut AgentCore) {
    let current = core.next_step_prompt.take().unwrap_or_default();
    let prompt = format!("{}\n{}", STUCK_PROMPT, current);
    warn!(agent = %core.name, "Agent detected stuck state. Added prompt: {}", STUCK_PROMPT);

    core.emit(names::STUCK_HANDLED, json!({"new_prompt": prompt}));
    core.next_step_prompt = Some(prompt);
}

// ============================================================================
// Step
// ============================================================================

/// step 하나 실행 (step:start/complete/error로 래핑)
pub async fn step<A: AgentHooks + ?Sized>(agent: &mut A) -> Result<String> {
    wrapped(agent, "step", &STEP_EVENTS, |a| Box::pin(think_and_act(a))).await
}

/// think 후 필요하면 act
async fn think_and_act<A: AgentHooks + ?Sized>(agent: &mut A) -> Result<String> {
    agent.core().emit(names::THINK_START, json!({}));
    let should_act = agent.think().await?;
    let usage = agent.core_mut().take_token_delta();
    agent.core().emit(names::THINK_TOKEN_COUNT, usage);
    agent.core().emit(names::THINK_COMPLETE, json!({}));

    if !should_act && !agent.core().should_terminate() {
        return Ok(NO_ACTION_RESULT.to_string());
    }

    agent.core().emit(names::ACT_START, json!({}));
    let result = agent.act().await?;
    let usage = agent.core_mut().take_token_delta();
    agent.core().emit(names::ACT_TOKEN_COUNT, usage);
    agent.core().emit(names::ACT_COMPLETE, json!({}));

    Ok(result)
}

// ============================================================================
// Run
// ============================================================================

/// 에이전트 실행
///
/// `Idle` 상태에서만 시작할 수 있습니다. 결과는 step별 결과를 줄바꿈으로 이은 문자열입니다.
/// 성공하면 `complete` 또는 `terminated`, 실패하면 `error` 이벤트로 끝납니다.
/// 자원 반납(`cleanup`)은 호출자의 몫입니다.
pub async fn run<A: AgentHooks + ?Sized>(agent: &mut A, request: Option<String>) -> Result<String> {
    let state = agent.core().state();
    if !state.can_run() {
        return Err(Error::InvalidState(format!(
            "Cannot run agent from state: {}",
            state
        )));
    }

    info!(agent = %agent.core().name, max_steps = agent.core().max_steps, "Agent run started");
    agent.core().emit(names::START, json!({"request": request}));

    match execute(agent, request).await {
        Ok(results) => {
            let mut totals = agent.core().token_totals();
            if agent.core().should_terminate() {
                agent.core().emit(names::TERMINATED, totals);
            } else {
                totals["results"] = json!(results);
                agent.core().emit(names::COMPLETE, totals);
            }
            info!(agent = %agent.core().name, steps = results.len(), "Agent run finished");

            if results.is_empty() {
                Ok(NO_STEPS_RESULT.to_string())
            } else {
                Ok(results.join("\n"))
            }
        }
        Err(e) => {
            error!(agent = %agent.core().name, error = %e, "Agent run failed");
            agent
                .core()
                .emit(names::ERROR, json!({"error": e.to_string()}));
            Err(e)
        }
    }
}

async fn execute<A: AgentHooks + ?Sized>(agent: &mut A, request: Option<String>) -> Result<Vec<String>> {
    agent.core().emit(names::PREPARE_START, json!({}));
    agent.prepare().await?;
    agent.core().emit(names::PREPARE_COMPLETE, json!({}));

    with_state(agent, AgentState::Running, move |a| {
        Box::pin(step_loop(a, request))
    })
    .await
}

async fn step_loop<A: AgentHooks + ?Sized>(agent: &mut A, request: Option<String>) -> Result<Vec<String>> {
    let mut results = Vec::new();

    if let Some(request) = request.filter(|r| !r.is_empty()) {
        agent.core_mut().add_message(Message::user(request));
        if agent.core().should_plan {
            agent.core().emit(names::PLAN_START, json!({}));
            let plan = agent.plan().await?;
            agent.core().emit(names::PLAN_COMPLETE, json!({"plan": plan}));
        }
    }

    while agent.core().current_step() < agent.core().max_steps
        && agent.core().state() != AgentState::Finished
    {
        // 외부 종료 요청은 반복 시작에서 확인
        if agent.core().should_terminate() {
            agent.core_mut().set_state(AgentState::Finished);
            break;
        }

        let current = agent.core().current_step() + 1;
        agent.core_mut().set_current_step(current);
        info!(
            agent = %agent.core().name,
            "Executing step {}/{}",
            current,
            agent.core().max_steps
        );

        let result = step(agent).await?;

        if is_stuck(agent.core()) {
            agent.core().emit(names::STUCK_DETECTED, json!({}));
            handle_stuck(agent.core_mut());
        }

        results.push(format!("Step {}: {}", current, result));

        if agent.core().should_terminate() {
            agent.core_mut().set_state(AgentState::Finished);
        }
    }

    if agent.core().state() != AgentState::Finished
        && agent.core().current_step() >= agent.core().max_steps
    {
        let max_steps = agent.core().max_steps;
        agent.core_mut().set_current_step(0);
        agent.core_mut().set_state(AgentState::Idle);
        agent
            .core()
            .emit(names::STEP_MAX_REACHED, json!({"max_steps": max_steps}));
        results.push(format!("Terminated: Reached max steps ({})", max_steps));
    }

    Ok(results)
}

/// 메모리에서 LLM에 보낼 대화 (시스템 메시지 제외)
pub fn conversation(core: &AgentCore) -> Vec<Message> {
    core.memory
        .messages()
        .iter()
        .filter(|m| m.role() != Role::System)
        .cloned()
        .collect()
}

// ============================================================================
// 테스트
// ============================================================================
