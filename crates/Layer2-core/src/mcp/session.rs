//! MCP Session - 핸드셰이크가 끝난 서버 세션
//!
//! `McpSession::establish`는 initialize → notifications/initialized → tools/list 까지
//! 모두 성공한 세션만 돌려줍니다. 중간에 실패하면 전송 계층을 닫고 에러를 반환하므로
//! 반쯤 연결된 세션은 호출자에게 보이지 않습니다.

use super::transport::McpTransport;
use super::types::{McpTool, McpToolResult, ServerInfo};
use pilot_foundation::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// MCP 프로토콜 버전
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// 연결된 MCP 세션
pub struct McpSession {
    transport: Arc<dyn McpTransport>,
    server_info: ServerInfo,
    tools: Vec<McpTool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    #[serde(default)]
    protocol_version: String,
    #[serde(default)]
    server_info: ServerInfo,
}

#[derive(Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<McpTool>,
}

impl McpSession {
    /// 핸드셰이크와 도구 목록 조회를 마친 세션 생성
    pub async fn establish(transport: Arc<dyn McpTransport>) -> Result<Self> {
        let server_info = match Self::initialize(transport.as_ref()).await {
            Ok(info) => info,
            Err(e) => {
                Self::abandon(transport.as_ref()).await;
                return Err(Error::McpConnection(format!(
                    "Failed to initialize MCP session: {}",
                    e
                )));
            }
        };

        let tools = match Self::list_tools(transport.as_ref()).await {
            Ok(tools) => tools,
            Err(e) => {
                Self::abandon(transport.as_ref()).await;
                return Err(Error::McpConnection(format!("Failed to list tools: {}", e)));
            }
        };

        info!(
            server = %server_info.name,
            tool_count = tools.len(),
            "MCP session established"
        );

        Ok(Self {
            transport,
            server_info,
            tools,
        })
    }

    async fn initialize(transport: &dyn McpTransport) -> Result<ServerInfo> {
        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "clientInfo": {
                "name": "pilot",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });

        let result = transport.request("initialize", Some(params)).await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| Error::Mcp(format!("Invalid initialize response: {}", e)))?;

        debug!(
            "MCP server '{}' v{} initialized (protocol: {})",
            init.server_info.name, init.server_info.version, init.protocol_version
        );

        transport.notify("notifications/initialized", None).await?;
        Ok(init.server_info)
    }

    async fn list_tools(transport: &dyn McpTransport) -> Result<Vec<McpTool>> {
        let result = transport.request("tools/list", None).await?;
        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| Error::Mcp(format!("Invalid tools/list response: {}", e)))?;
        Ok(list.tools)
    }

    /// 실패한 연결 정리 (best-effort)
    async fn abandon(transport: &dyn McpTransport) {
        if let Err(e) = transport.close().await {
            warn!("Failed to close partial MCP transport: {}", e);
        }
    }

    /// 원격 도구 호출 (서버 쪽 이름 사용)
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult> {
        if !self.transport.is_connected() {
            return Err(Error::McpConnection("Not connected to MCP server".to_string()));
        }

        debug!("Calling MCP tool: {} with args: {}", name, arguments);
        let result = self
            .transport
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;

        serde_json::from_value(result)
            .map_err(|e| Error::Mcp(format!("Invalid tools/call response: {}", e)))
    }

    /// 연결 종료
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 스크립트된 응답을 돌려주는 전송 계층
    pub(crate) struct ScriptedTransport {
        pub label: String,
        pub tools: Vec<&'static str>,
        pub fail_on: Option<&'static str>,
        pub connected: AtomicBool,
        pub calls: Mutex<Vec<String>>,
        pub close_log: Option<Arc<Mutex<Vec<String>>>>,
    }

    impl ScriptedTransport {
        pub fn new(label: &str, tools: Vec<&'static str>) -> Self {
            Self {
                label: label.to_string(),
                tools,
                fail_on: None,
                connected: AtomicBool::new(true),
                calls: Mutex::new(Vec::new()),
                close_log: None,
            }
        }
    }

    #[async_trait]
    impl McpTransport for ScriptedTransport {
        async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
            self.calls.lock().push(method.to_string());
            if self.fail_on == Some(method) {
                return Err(Error::Mcp(format!("{} refused", method)));
            }
            match method {
                "initialize" => Ok(json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "serverInfo": {"name": self.label, "version": "1.0"}
                })),
                "tools/list" => Ok(json!({
                    "tools": self.tools.iter().map(|t| json!({
                        "name": t,
                        "description": format!("{} tool", t),
                        "inputSchema": {"type": "object"}
                    })).collect::<Vec<_>>()
                })),
                "tools/call" => {
                    let params = params.unwrap_or_default();
                    Ok(json!({
                        "content": [
                            {"type": "text", "text": format!("called {}", params["name"].as_str().unwrap_or(""))},
                            {"type": "text", "text": params["arguments"].to_string()}
                        ]
                    }))
                }
                other => Err(Error::Mcp(format!("unexpected method {}", other))),
            }
        }

        async fn notify(&self, method: &str, _params: Option<Value>) -> Result<()> {
            self.calls.lock().push(method.to_string());
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.connected.store(false, Ordering::SeqCst);
            if let Some(log) = &self.close_log {
                log.lock().push(self.label.clone());
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_establish_runs_handshake_then_lists_tools() {
        let transport = Arc::new(ScriptedTransport::new("fs", vec!["read", "write"]));
        let session = McpSession::establish(transport.clone()).await.unwrap();

        assert_eq!(session.server_info().name, "fs");
        assert_eq!(session.tools().len(), 2);
        assert_eq!(
            *transport.calls.lock(),
            vec!["initialize", "notifications/initialized", "tools/list"]
        );
    }

    #[tokio::test]
    async fn test_handshake_failure_closes_transport() {
        let mut transport = ScriptedTransport::new("fs", vec![]);
        transport.fail_on = Some("initialize");
        let transport = Arc::new(transport);

        let err = McpSession::establish(transport.clone()).await.err().unwrap();
        assert!(err.to_string().contains("Failed to initialize MCP session"));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_list_failure_closes_transport() {
        let mut transport = ScriptedTransport::new("fs", vec![]);
        transport.fail_on = Some("tools/list");
        let transport = Arc::new(transport);

        let err = McpSession::establish(transport.clone()).await.err().unwrap();
        assert!(err.to_string().contains("Failed to list tools"));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_call_after_close_fails() {
        let transport = Arc::new(ScriptedTransport::new("fs", vec!["read"]));
        let session = McpSession::establish(transport).await.unwrap();

        let result = session.call_tool("read", json!({"path": "a"})).await.unwrap();
        assert!(result.joined_text().starts_with("called read"));

        session.close().await.unwrap();
        assert!(session.call_tool("read", json!({})).await.is_err());
    }
}
