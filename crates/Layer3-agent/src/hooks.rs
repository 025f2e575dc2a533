//! Agent Hooks - 구체 에이전트가 구현하는 단계
//!
//! 루프 자체(`lifecycle`)는 공통이고, 에이전트마다 다른 부분만 이 trait으로 정의합니다.
//!
//! ```text
//! run ─▶ prepare ─▶ [plan] ─▶ step × N ─▶ (호출자) cleanup
//!                              │
//!                              └─ think ─▶ [act]
//! ```

use crate::core::AgentCore;
use async_trait::async_trait;
use pilot_foundation::Result;

/// 에이전트 단계 정의
#[async_trait]
pub trait AgentHooks: Send {
    /// 공통 상태
    fn core(&self) -> &AgentCore;

    fn core_mut(&mut self) -> &mut AgentCore;

    /// 외부 자원 확보 (샌드박스, 도구 연결 등)
    async fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// 첫 step 전에 계획 수립 (기본: 아무것도 안 함)
    async fn plan(&mut self) -> Result<String> {
        Ok(String::new())
    }

    /// 다음 행동이 필요한지 결정
    async fn think(&mut self) -> Result<bool>;

    /// 결정된 행동 실행
    async fn act(&mut self) -> Result<String>;

    /// 자원 반납
    async fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}
