//! General Agent - 도구 호출 기반 범용 에이전트
//!
//! - prepare: 샌드박스 생성, 시스템 프롬프트, 도구 등록 (builtin + terminate + MCP)
//! - plan: LLM에게 계획을 한 번 요청해 user 메시지로 기록
//! - think: 도구 목록과 함께 LLM 호출, 선택된 도구 기록
//! - act: 선택된 도구를 순서대로 실행하고 결과를 tool 메시지로 기록
//! - cleanup: MCP 연결 정리 후 샌드박스 삭제
//!
//! ## 사용법
//!
//! ```ignore
//! use pilot_agent::{run, AgentConfig, AgentHooks, GeneralAgent, GeneralAgentOptions};
//!
//! let options = GeneralAgentOptions::new("task-1", "Summarize README.md")
//!     .with_tools(vec![RequestedTool::Builtin("bash".into())]);
//! let mut agent = GeneralAgent::new(AgentConfig::new("general"), llm, sandboxes, options);
//!
//! let output = run(&mut agent, Some("Summarize README.md".into())).await;
//! agent.cleanup().await?;
//! ```

use crate::core::{AgentConfig, AgentCore};
use crate::hooks::AgentHooks;
use crate::lifecycle::conversation;
use crate::prompt;
use async_trait::async_trait;
use chrono::Utc;
use pilot_core::mcp::{DefaultConnector, DEFAULT_REQUEST_TIMEOUT};
use pilot_core::{
    create_builtin, McpConnectionHost, McpConnector, McpServerSpec, TerminateTool, ToolCollection,
    BUILTIN_TOOL_NAMES,
};
use pilot_foundation::event::names;
use pilot_foundation::{
    EmitOptions, Error, LlmClient, Message, Result, Sandbox, ToolCall, ToolChoice, ToolResult,
};
use pilot_sandbox::SandboxProvider;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// 샌드박스 ID 접두사
pub const SANDBOX_PREFIX: &str = "pilot-sandbox";

// ============================================================================
// RequestedTool
// ============================================================================

/// 요청에서 지정한 도구
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestedTool {
    /// builtin 도구 이름
    Builtin(String),
    /// MCP 서버
    Mcp(McpServerSpec),
}

impl RequestedTool {
    /// 요청 값 해석
    ///
    /// 문자열은 JSON 객체로 읽히면 MCP 서버, 아니면 builtin 이름입니다.
    pub fn parse(value: &Value) -> Result<Self> {
        let tool = match value {
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(object @ Value::Object(_)) => Self::mcp_from(object, text)?,
                _ => RequestedTool::Builtin(text.trim().to_string()),
            },
            Value::Object(_) => Self::mcp_from(value.clone(), &value.to_string())?,
            other => {
                return Err(Error::InvalidRequest(format!(
                    "Invalid tool configuration: {}",
                    other
                )))
            }
        };
        tool.validate()?;
        Ok(tool)
    }

    fn mcp_from(object: Value, raw: &str) -> Result<Self> {
        serde_json::from_value(object)
            .map(RequestedTool::Mcp)
            .map_err(|e| {
                Error::InvalidRequest(format!("Invalid tool configuration for '{}': {}", raw, e))
            })
    }

    /// 알 수 없는 builtin 이름이나 전송 정보가 없는 MCP 지정 거부
    pub fn validate(&self) -> Result<()> {
        match self {
            RequestedTool::Builtin(name)
                if BUILTIN_TOOL_NAMES.contains(&name.as_str()) || name == TerminateTool::NAME =>
            {
                Ok(())
            }
            RequestedTool::Builtin(name) => {
                Err(Error::InvalidRequest(format!("Unknown tool: {}", name)))
            }
            RequestedTool::Mcp(spec) => spec.transport().map(|_| ()),
        }
    }
}

/// 요청의 대화 기록 해석 (`{role, content, tool_call_id?}` 목록)
pub fn parse_history(items: &[Value]) -> Result<Vec<Message>> {
    items
        .iter()
        .map(|item| {
            let role = item
                .get("role")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidRequest("history item requires role".to_string()))?;
            let content = item.get("content").and_then(Value::as_str).unwrap_or_default();
            let tool_call_id = item.get("tool_call_id").and_then(Value::as_str);
            Message::from_role(role.parse()?, content, tool_call_id)
        })
        .collect()
}

/// task ID로 샌드박스(컨테이너) 이름 생성
pub fn sandbox_id_for(task_id: &str) -> String {
    let safe: String = task_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{}", SANDBOX_PREFIX, safe)
}

/// 에이전트 인스턴스 전용 샌드박스 이름
///
/// 같은 task ID로 교체된 에이전트끼리 샌드박스(와 MCP 컨테이너)를 공유하지 않도록
/// 짧은 무작위 접미사를 붙입니다.
pub fn instance_sandbox_id(task_id: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", sandbox_id_for(task_id), &suffix[..8])
}

// ============================================================================
// GeneralAgentOptions
// ============================================================================

/// 범용 에이전트 옵션
#[derive(Debug, Clone)]
pub struct GeneralAgentOptions {
    /// task ID
    pub task_id: String,

    /// 원래 요청 (계획 수립에 사용)
    pub request: String,

    /// 응답 언어
    pub language: String,

    /// 요청된 도구
    pub tools: Vec<RequestedTool>,

    /// 이전 대화
    pub history: Vec<Message>,

    /// MCP 요청 타임아웃
    pub mcp_timeout: Duration,
}

impl GeneralAgentOptions {
    pub fn new(task_id: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            request: request.into(),
            language: "English".to_string(),
            tools: Vec::new(),
            history: Vec::new(),
            mcp_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<RequestedTool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_mcp_timeout(mut self, timeout: Duration) -> Self {
        self.mcp_timeout = timeout;
        self
    }
}

// ============================================================================
// GeneralAgent
// ============================================================================

/// 도구 호출 기반 범용 에이전트
pub struct GeneralAgent {
    core: AgentCore,
    options: GeneralAgentOptions,
    sandboxes: Arc<dyn SandboxProvider>,
    connector: Arc<dyn McpConnector>,

    /// 이 인스턴스가 만들고 지우는 샌드박스 이름
    sandbox_id: String,

    /// prepare에서 확보
    sandbox: Option<Arc<dyn Sandbox>>,
    host: Option<McpConnectionHost>,
    tools: ToolCollection,

    /// think가 고른 도구 호출 (act에서 소비)
    pending_calls: Vec<ToolCall>,
}

impl GeneralAgent {
    pub fn new(
        config: AgentConfig,
        llm: Arc<dyn LlmClient>,
        sandboxes: Arc<dyn SandboxProvider>,
        options: GeneralAgentOptions,
    ) -> Self {
        let connector = Arc::new(DefaultConnector::new(options.mcp_timeout));
        let sandbox_id = instance_sandbox_id(&options.task_id);
        Self {
            core: AgentCore::new(config, llm),
            options,
            sandboxes,
            connector,
            sandbox_id,
            sandbox: None,
            host: None,
            tools: ToolCollection::new(),
            pending_calls: Vec::new(),
        }
    }

    /// MCP 연결 팩토리 교체
    pub fn with_connector(mut self, connector: Arc<dyn McpConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn task_id(&self) -> &str {
        &self.options.task_id
    }

    pub fn sandbox_id(&self) -> &str {
        &self.sandbox_id
    }

    pub fn tools(&self) -> &ToolCollection {
        &self.tools
    }

    pub fn sandbox(&self) -> Option<&Arc<dyn Sandbox>> {
        self.sandbox.as_ref()
    }

    /// 이번 step에 LLM에게 줄 안내 (stuck 안내가 있으면 앞에 붙음)
    fn step_guidance(&self) -> String {
        let progress = prompt::next_step_prompt(self.core.current_step(), self.core.max_steps);
        match self.core.next_step_prompt.as_deref().map(str::trim_end) {
            Some(extra) if !extra.is_empty() => format!("{}\n{}", extra, progress),
            _ => progress,
        }
    }

    /// 도구 호출 하나 실행 후 관찰 결과 반환
    async fn execute_call(&mut self, call: &ToolCall) -> String {
        let options = || EmitOptions::new().with_parent(call.id.clone());

        self.core.emit_with(
            names::TOOL_START,
            json!({"id": call.id, "name": call.name, "arguments": call.arguments}),
            options(),
        );

        let result = match call.parse_arguments() {
            Ok(args) => {
                self.core.emit_with(
                    names::TOOL_EXECUTE_START,
                    json!({"name": call.name, "arguments": args}),
                    options(),
                );
                let result = self.tools.execute(&call.name, args).await;
                self.core.emit_with(
                    names::TOOL_EXECUTE_COMPLETE,
                    json!({"name": call.name, "result": result.to_string()}),
                    options(),
                );
                result
            }
            Err(e) => {
                warn!(tool = %call.name, "Invalid tool arguments: {}", e);
                ToolResult::error(format!(
                    "Error parsing arguments for {}: Invalid JSON format",
                    call.name
                ))
            }
        };

        if call.name == TerminateTool::NAME && !result.is_error() {
            info!(task_id = %self.options.task_id, "Terminate tool called, finishing run");
            self.core.mark_terminate();
        }

        let observation = observation(&call.name, &result);
        match &result.error {
            Some(error) => self.core.emit_with(
                names::TOOL_ERROR,
                json!({"name": call.name, "error": error}),
                options(),
            ),
            None => self.core.emit_with(
                names::TOOL_COMPLETE,
                json!({"name": call.name, "result": observation}),
                options(),
            ),
        };

        self.core.add_message(Message::tool(
            observation.clone(),
            call.id.clone(),
            call.name.clone(),
        ));
        observation
    }
}

/// LLM에게 돌려줄 도구 결과 문구
fn observation(name: &str, result: &ToolResult) -> String {
    let mut text = if let Some(error) = &result.error {
        format!("Error: {}", error)
    } else if result.output.is_empty() {
        format!("Cmd `{}` completed with no output", name)
    } else {
        format!("Observed output of cmd `{}` executed:\n{}", name, result.output)
    };
    if let Some(system) = &result.system {
        text.push('\n');
        text.push_str(system);
    }
    text
}

#[async_trait]
impl AgentHooks for GeneralAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn prepare(&mut self) -> Result<()> {
        let sandbox = self.sandboxes.create(&self.sandbox_id).await?;
        info!(task_id = %self.options.task_id, sandbox = %self.sandbox_id, "Sandbox ready");
        self.sandbox = Some(sandbox.clone());

        let now = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let system = prompt::system_prompt(
            &self.options.task_id,
            &self.options.language,
            self.core.max_steps,
            &now,
        );
        self.core.system_prompt = Some(system.clone());
        self.core.add_message(Message::system(system));
        for message in std::mem::take(&mut self.options.history) {
            self.core.add_message(message);
        }

        self.tools = ToolCollection::new();
        self.tools.add_tool(Arc::new(TerminateTool::new()));

        // 중간에 실패해도 cleanup이 이미 연결된 것을 정리하도록 먼저 보관
        let host = self
            .host
            .insert(McpConnectionHost::with_connector(sandbox.clone(), self.connector.clone()));

        for requested in &self.options.tools {
            match requested {
                RequestedTool::Builtin(name) if name == TerminateTool::NAME => {}
                RequestedTool::Builtin(name) => match create_builtin(name, sandbox.clone()) {
                    Some(tool) => {
                        self.tools.add_tool(tool);
                    }
                    None => warn!(tool = %name, "Unknown builtin tool, skipping"),
                },
                RequestedTool::Mcp(spec) => {
                    let tools = host.add_spec(spec).await?;
                    self.tools.add_tools(tools);
                }
            }
        }

        info!(
            task_id = %self.options.task_id,
            tools = %self.tools.names().join(", "),
            "Agent prepared"
        );
        Ok(())
    }

    async fn plan(&mut self) -> Result<String> {
        let available = self
            .tools
            .iter()
            .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let plan_prompt = prompt::plan_prompt(&self.options.language, self.core.max_steps, &available);

        let llm = self.core.llm().clone();
        let messages = [
            Message::system(plan_prompt),
            Message::user(self.options.request.clone()),
        ];
        let plan = llm
            .ask(&messages, self.core.system_prompt.as_deref())
            .await?;

        self.core.add_message(Message::user(plan.clone()));
        Ok(plan)
    }

    async fn think(&mut self) -> Result<bool> {
        let guidance = self.step_guidance();
        self.core.add_message(Message::user(guidance));

        let llm = self.core.llm().clone();
        let messages = conversation(&self.core);
        let params = self.tools.to_params();
        let response = llm
            .ask_tool(
                &messages,
                self.core.system_prompt.as_deref(),
                &params,
                ToolChoice::Auto,
            )
            .await?;

        let calls = response.tool_calls;
        if !calls.is_empty() {
            let selected: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            info!(task_id = %self.options.task_id, tools = ?selected, "Tools selected");
            self.core.emit(
                names::THINK_TOOL_SELECTED,
                json!({"tools": selected, "content": response.content}),
            );
        }

        let should_act = !calls.is_empty() || !response.content.is_empty();
        self.core
            .add_message(Message::assistant_with_tools(response.content, calls.clone()));
        self.pending_calls = calls;
        Ok(should_act)
    }

    async fn act(&mut self) -> Result<String> {
        let calls = std::mem::take(&mut self.pending_calls);
        if calls.is_empty() {
            let last = self
                .core
                .memory
                .last()
                .map(|m| m.content().to_string())
                .filter(|c| !c.is_empty());
            return Ok(last.unwrap_or_else(|| "No content or commands to execute".to_string()));
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            results.push(self.execute_call(call).await);
        }
        Ok(results.join("\n\n"))
    }

    async fn cleanup(&mut self) -> Result<()> {
        info!(task_id = %self.options.task_id, "Cleaning up agent resources");
        if let Some(mut host) = self.host.take() {
            host.cleanup().await;
        }
        if let Some(sandbox) = self.sandbox.take() {
            self.sandboxes.delete(sandbox.id()).await?;
        }
        Ok(())
    }
}

// ============================================================================
// 테스트
// ============================================================================
