//! pilot-core: Core Runtime for Pilot
//!
//! Layer2 - 에이전트 도구 구현 레이어
//!
//! # 주요 모듈
//!
//! - `mcp`: MCP (Model Context Protocol) 연결 호스트와 전송 계층
//! - `tool`: 도구 모음 및 Builtin 도구들
//!
//! # 사용 예시
//!
//! ```ignore
//! use pilot_core::{McpConnectionHost, ToolCollection, create_builtin};
//!
//! let mut tools = ToolCollection::new();
//! for name in ["bash", "file_operator", "terminate"] {
//!     if let Some(tool) = create_builtin(name, sandbox.clone()) {
//!         tools.add_tool(tool);
//!     }
//! }
//!
//! // MCP 서버 도구 추가
//! let mut host = McpConnectionHost::new(sandbox.clone());
//! tools.add_tools(host.add_spec(&spec).await?);
//!
//! let result = tools.execute("bash", json!({"command": "ls"})).await;
//! ```

pub mod mcp;
pub mod tool;

// Re-exports: MCP
pub use mcp::{
    McpConnectionHost, McpConnector, McpRemoteTool, McpServerSpec, McpSession, McpTool,
    McpToolResult, McpTransport, McpTransportConfig, SseTransport, StdioTransport,
    TransportKind,
};

// Re-exports: Tool
pub use tool::{
    create_builtin, BashTool, FileOperatorTool, TerminateTool, ToolCollection, BUILTIN_TOOL_NAMES,
};

// Layer1 re-exports
pub use pilot_foundation::{Error, Result};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
