//! Agent State - 에이전트 상태
//!
//! `Idle → Running → Finished` 흐름에 `Error`로의 일시적 이탈이 더해집니다.
//! `Error`는 머무르는 상태가 아니라 실패를 알리는 전이 대상입니다.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// AgentState
// ============================================================================

/// 에이전트 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    /// 대기 중 (run 가능)
    #[default]
    Idle,

    /// step 루프 실행 중
    Running,

    /// 종료 요청으로 루프를 마침
    Finished,

    /// 실패 알림용
    Error,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "IDLE",
            AgentState::Running => "RUNNING",
            AgentState::Finished => "FINISHED",
            AgentState::Error => "ERROR",
        }
    }

    /// run을 시작할 수 있는 상태인지
    pub fn can_run(&self) -> bool {
        matches!(self, AgentState::Idle)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
