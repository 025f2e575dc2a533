//! MCP Host - Model Context Protocol 연동
//!
//! 외부 MCP 서버의 도구를 에이전트 도구로 노출합니다.
//!
//! ## 기능
//! - 연결 관리 (추가/제거/역순 정리)
//! - 도구 목록 동기화 (`{client_id}-{tool}` 접두사)
//! - 도구 호출 프록시
//! - stdio 서버 명령의 샌드박스 실행 변환
//!
//! ## 지원 전송
//! - stdio (로컬 프로세스)
//! - SSE (HTTP Server-Sent Events)
//!
//! ## 참고
//! - https://modelcontextprotocol.io/

mod host;
mod remote_tool;
mod sandbox_command;
mod session;
mod transport;
mod types;

pub use host::{DefaultConnector, McpConnection, McpConnectionHost, McpConnector};
pub use remote_tool::McpRemoteTool;
pub use sandbox_command::{to_sandbox_command, CommandKind, SandboxCommand, CONTAINER_WORKSPACE};
pub use session::{McpSession, MCP_PROTOCOL_VERSION};
pub use transport::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpTransport,
    SseTransport, StdioTransport, DEFAULT_REQUEST_TIMEOUT,
};
pub use types::{
    McpContent, McpServerSpec, McpTool, McpToolResult, McpTransportConfig, ServerInfo,
    TransportKind,
};
