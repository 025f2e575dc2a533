//! MCP Remote Tool - 원격 MCP 도구를 로컬 Tool로 노출
//!
//! 에이전트에 보이는 이름은 `{client_id}-{tool}` 형식이고,
//! 서버를 호출할 때는 접두사를 떼어 원래 이름을 사용합니다.

use super::session::McpSession;
use super::types::McpTool;
use async_trait::async_trait;
use pilot_foundation::{Result, Tool, ToolResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// 원격 MCP 도구 어댑터
pub struct McpRemoteTool {
    /// 접두사가 붙은 이름
    name: String,
    /// 서버 쪽 원래 이름
    remote_name: String,
    client_id: String,
    description: String,
    parameters: Value,
    session: Arc<McpSession>,
}

impl McpRemoteTool {
    pub fn new(client_id: &str, tool: &McpTool, session: Arc<McpSession>) -> Self {
        Self {
            name: format!("{}-{}", client_id, tool.name),
            remote_name: tool.name.clone(),
            client_id: client_id.to_string(),
            description: tool.description.clone().unwrap_or_default(),
            parameters: tool.input_schema.clone(),
            session,
        }
    }

    /// 이 도구가 속한 클라이언트 ID
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// 서버에 등록된 원래 이름
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl Tool for McpRemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        if !self.session.is_connected() {
            return Ok(ToolResult::error("Not connected to MCP server"));
        }

        debug!(tool = %self.name, "Executing remote MCP tool");
        match self.session.call_tool(&self.remote_name, input).await {
            Ok(result) if result.is_error => Ok(ToolResult::error(result.joined_text())),
            Ok(result) => Ok(ToolResult::success(result.joined_text())),
            Err(e) => Ok(ToolResult::error(format!("Error executing tool: {}", e))),
        }
    }
}
