//! # pilot-agent
//!
//! 에이전트 실행 엔진 - 상태 머신과 think/act 루프
//!
//! ## 핵심 컴포넌트
//!
//! - **AgentCore**: 상태, step 카운터, 메모리, 이벤트 버스, LLM을 묶은 공통 상태
//! - **AgentHooks**: 구체 에이전트가 구현하는 prepare/plan/think/act/cleanup
//! - **lifecycle**: 상태 가드, 이벤트 래퍼, ReAct step, stuck 처리, run 루프
//! - **GeneralAgent**: 샌드박스 + builtin/MCP 도구를 쓰는 범용 에이전트
//!
//! ## 사용 예
//!
//! ```ignore
//! use pilot_agent::{run, AgentConfig, AgentHooks, GeneralAgent, GeneralAgentOptions};
//!
//! let mut agent = GeneralAgent::new(config, llm, sandboxes, options);
//! let terminate = agent.core().terminate_handle();
//!
//! // 이벤트 구독
//! agent.core().bus().subscribe("agent:lifecycle:step:.*", handler)?;
//!
//! let output = run(&mut agent, Some(prompt)).await?;
//! agent.cleanup().await?;
//! ```

pub mod core;
pub mod general;
pub mod hooks;
pub mod lifecycle;
pub mod prompt;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Exports
// ============================================================================

pub use crate::core::{AgentConfig, AgentCore, TerminateHandle, MAX_EXTENSIONS};
pub use general::{
    instance_sandbox_id, parse_history, sandbox_id_for, GeneralAgent, GeneralAgentOptions,
    RequestedTool,
};
pub use hooks::AgentHooks;
pub use lifecycle::{
    handle_stuck, is_stuck, run, step, with_state, wrapped, WrapperEvents, STEP_EVENTS,
    STUCK_PROMPT,
};
pub use state::AgentState;
