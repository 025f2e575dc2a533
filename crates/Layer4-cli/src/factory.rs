//! Agent Factory - 요청마다 에이전트 조립
//!
//! HTTP 요청에서 파싱한 `TaskSpec`을 받아 등록 가능한 에이전트를 만듭니다.
//! 기본 구현은 샌드박스 + builtin/MCP 도구를 쓰는 `GeneralAgent`입니다.

use pilot_agent::{AgentConfig, AgentHooks, GeneralAgent, GeneralAgentOptions, RequestedTool};
use pilot_foundation::config::LlmSettings;
use pilot_foundation::{Error, LlmClient, Message, PilotConfig, Result};
use pilot_provider::OpenAiClient;
use pilot_sandbox::SandboxProvider;
use std::sync::Arc;

/// 에이전트 이름
pub const AGENT_NAME: &str = "Pilot";

const AGENT_DESCRIPTION: &str = "A versatile agent that can solve various tasks using multiple tools";

/// 에이전트 하나를 만드는 데 필요한 입력
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub task_id: String,
    pub prompt: String,
    pub should_plan: bool,
    pub max_steps: Option<u32>,
    pub language: Option<String>,
    pub tools: Vec<RequestedTool>,
    pub history: Vec<Message>,

    /// 요청별 LLM 설정 (없으면 서버 기본 클라이언트)
    pub llm: Option<LlmSettings>,
}

/// 에이전트 생성기
pub trait AgentFactory: Send + Sync {
    fn build(&self, spec: TaskSpec) -> Result<Box<dyn AgentHooks>>;
}

/// `GeneralAgent` 생성기
pub struct GeneralAgentFactory {
    config: Arc<PilotConfig>,
    llm: Option<Arc<dyn LlmClient>>,
    sandboxes: Arc<dyn SandboxProvider>,
}

impl GeneralAgentFactory {
    pub fn new(
        config: Arc<PilotConfig>,
        llm: Option<Arc<dyn LlmClient>>,
        sandboxes: Arc<dyn SandboxProvider>,
    ) -> Self {
        Self {
            config,
            llm,
            sandboxes,
        }
    }

    fn llm_for(&self, spec: &TaskSpec) -> Result<Arc<dyn LlmClient>> {
        match &spec.llm {
            Some(settings) => Ok(Arc::new(OpenAiClient::from_settings(settings)?)),
            None => self
                .llm
                .clone()
                .ok_or_else(|| Error::Config("No LLM credentials configured".to_string())),
        }
    }
}

impl AgentFactory for GeneralAgentFactory {
    fn build(&self, spec: TaskSpec) -> Result<Box<dyn AgentHooks>> {
        let llm = self.llm_for(&spec)?;

        let mut config = AgentConfig::from_settings(AGENT_NAME, &self.config.agent)
            .with_description(AGENT_DESCRIPTION)
            .with_planning(spec.should_plan);
        if let Some(max_steps) = spec.max_steps {
            config = config.with_max_steps(max_steps);
        }

        let language = spec
            .language
            .unwrap_or_else(|| self.config.agent.language.clone());
        let options = GeneralAgentOptions::new(spec.task_id, spec.prompt)
            .with_language(language)
            .with_tools(spec.tools)
            .with_history(spec.history)
            .with_mcp_timeout(self.config.mcp.request_timeout());

        Ok(Box::new(GeneralAgent::new(
            config,
            llm,
            self.sandboxes.clone(),
            options,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NoSandboxes, SilentLlm};

    fn spec() -> TaskSpec {
        TaskSpec {
            task_id: "t1".to_string(),
            prompt: "hello".to_string(),
            should_plan: true,
            max_steps: Some(7),
            language: None,
            tools: vec![RequestedTool::Builtin("bash".to_string())],
            history: Vec::new(),
            llm: None,
        }
    }

    #[tokio::test]
    async fn test_build_applies_preferences() {
        let factory = GeneralAgentFactory::new(
            Arc::new(PilotConfig::default()),
            Some(Arc::new(SilentLlm)),
            Arc::new(NoSandboxes),
        );

        let agent = factory.build(spec()).unwrap();
        assert_eq!(agent.core().name, AGENT_NAME);
        assert_eq!(agent.core().max_steps, 7);
        assert!(agent.core().should_plan);
    }

    #[tokio::test]
    async fn test_build_without_llm_fails() {
        let factory = GeneralAgentFactory::new(
            Arc::new(PilotConfig::default()),
            None,
            Arc::new(NoSandboxes),
        );

        let err = factory.build(spec()).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
