//! Event Names - 에이전트 이벤트 이름 체계
//!
//! 모든 이름은 `agent:lifecycle` 아래의 계층 경로이므로
//! `agent:lifecycle:step:.*` 같은 하나의 패턴으로 하위 트리 전체를 구독할 수 있습니다.

/// 모든 이벤트에 매칭되는 구독 패턴
pub const MATCH_ALL: &str = "agent:.*";

// ============================================================================
// Lifecycle
// ============================================================================

pub const START: &str = "agent:lifecycle:start";
pub const PREPARE_START: &str = "agent:lifecycle:prepare:start";
pub const PREPARE_COMPLETE: &str = "agent:lifecycle:prepare:complete";
pub const PLAN_START: &str = "agent:lifecycle:plan:start";
pub const PLAN_COMPLETE: &str = "agent:lifecycle:plan:complete";
pub const COMPLETE: &str = "agent:lifecycle:complete";
pub const TERMINATING: &str = "agent:lifecycle:terminating";
pub const TERMINATED: &str = "agent:lifecycle:terminated";
pub const ERROR: &str = "agent:lifecycle:error";

// ============================================================================
// State
// ============================================================================

pub const STATE_CHANGE: &str = "agent:lifecycle:state:change";
pub const STUCK_DETECTED: &str = "agent:lifecycle:state:stuck_detected";
pub const STUCK_HANDLED: &str = "agent:lifecycle:state:stuck_handled";
pub const STEP_MAX_REACHED: &str = "agent:lifecycle:step_max_reached";
pub const MEMORY_ADDED: &str = "agent:lifecycle:memory:added";

// ============================================================================
// Step (think / act)
// ============================================================================

pub const STEP_START: &str = "agent:lifecycle:step:start";
pub const STEP_COMPLETE: &str = "agent:lifecycle:step:complete";
pub const STEP_ERROR: &str = "agent:lifecycle:step:error";

pub const THINK_START: &str = "agent:lifecycle:step:think:start";
pub const THINK_COMPLETE: &str = "agent:lifecycle:step:think:complete";
pub const THINK_ERROR: &str = "agent:lifecycle:step:think:error";
pub const THINK_TOKEN_COUNT: &str = "agent:lifecycle:step:think:token:count";
pub const THINK_TOOL_SELECTED: &str = "agent:lifecycle:step:think:tool:selected";

pub const ACT_START: &str = "agent:lifecycle:step:act:start";
pub const ACT_COMPLETE: &str = "agent:lifecycle:step:act:complete";
pub const ACT_ERROR: &str = "agent:lifecycle:step:act:error";
pub const ACT_TOKEN_COUNT: &str = "agent:lifecycle:step:act:token:count";

pub const TOOL_START: &str = "agent:lifecycle:step:act:tool:start";
pub const TOOL_COMPLETE: &str = "agent:lifecycle:step:act:tool:complete";
pub const TOOL_ERROR: &str = "agent:lifecycle:step:act:tool:error";
pub const TOOL_EXECUTE_START: &str = "agent:lifecycle:step:act:tool:execute:start";
pub const TOOL_EXECUTE_COMPLETE: &str = "agent:lifecycle:step:act:tool:execute:complete";

/// 스트림을 끝내는 이벤트인지 확인
///
/// 정상 완료, 종료 요청에 의한 종료, 루프 실패 모두 마지막 이벤트입니다.
pub fn is_terminal(name: &str) -> bool {
    matches!(name, COMPLETE | TERMINATED | ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_subtree_pattern_matches_children() {
        let step = Regex::new("^(?:agent:lifecycle:step:.*)$").unwrap();
        assert!(step.is_match(THINK_START));
        assert!(step.is_match(TOOL_EXECUTE_COMPLETE));
        assert!(!step.is_match(STEP_MAX_REACHED));
        assert!(!step.is_match(STATE_CHANGE));
    }

    #[test]
    fn test_terminal_names() {
        assert!(is_terminal(COMPLETE));
        assert!(is_terminal(TERMINATED));
        assert!(is_terminal(ERROR));
        assert!(!is_terminal(TERMINATING));
        assert!(!is_terminal(STEP_COMPLETE));
    }
}
