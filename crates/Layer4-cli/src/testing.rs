//! 테스트용 더블: 즉시 끝나는 에이전트와 생성기

use crate::factory::{AgentFactory, TaskSpec};
use crate::AppState;
use async_trait::async_trait;
use pilot_agent::{AgentConfig, AgentCore, AgentHooks};
use pilot_foundation::{
    Error, LlmClient, LlmResponse, Message, PilotConfig, Result, Sandbox, ToolChoice,
};
use pilot_sandbox::SandboxProvider;
use serde_json::Value;
use std::sync::Arc;

pub(crate) struct SilentLlm;

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

struct StubFactory {
    fail: bool,
}

impl AgentFactory for StubFactory {
    fn build(&self, spec: TaskSpec) -> Result<Box<dyn AgentHooks>> {
        if self.fail {
            return Err(Error::Config("No LLM credentials configured".to_string()));
        }

        let config = AgentConfig::new("echo").with_max_steps(spec.max_steps.unwrap_or(3));
        Ok(Box::new(EchoAgent {
            core: AgentCore::new(config, Arc::new(SilentLlm)),
        }))
    }
}

pub(crate) fn test_state() -> AppState {
    AppState::new(
        Arc::new(PilotConfig::default()),
        Arc::new(StubFactory { fail: false }),
    )
}

pub(crate) fn failing_state() -> AppState {
    AppState::new(
        Arc::new(PilotConfig::default()),
        Arc::new(StubFactory { fail: true }),
    )
}

/// 생성/삭제를 하지 않는 샌드박스 공급자
pub(crate) struct NoSandboxes;

#[async_trait]
impl SandboxProvider for NoSandboxes {
    async fn create(&self, id: &str) -> Result<Arc<dyn Sandbox>> {
        Err(Error::Sandbox(format!("sandbox {} unavailable", id)))
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}
