//! Error types for Pilot
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pilot 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 / 요청 검증
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ========================================================================
    // Tool 관련
    // ========================================================================
    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool} - {message}")]
    ToolExecution { tool: String, message: String },

    // ========================================================================
    // MCP 관련
    // ========================================================================
    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("MCP client already exists: {0}")]
    McpClientExists(String),

    #[error("MCP client not found: {0}")]
    McpClientNotFound(String),

    #[error("MCP connection error: {0}")]
    McpConnection(String),

    // ========================================================================
    // Sandbox / LLM
    // ========================================================================
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("LLM error: {0}")]
    Llm(String),

    // ========================================================================
    // Task/Agent 관련
    // ========================================================================
    #[error("Task error: {0}")]
    Task(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Agent error: {0}")]
    Agent(String),

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::McpConnection(_) | Error::Http(_) | Error::Llm(_)
        )
    }

    /// 요청 자체가 잘못된 경우 (HTTP 400 계열)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidRequest(_)
                | Error::InvalidState(_)
                | Error::McpClientExists(_)
                | Error::Json(_)
        )
    }

    /// Tool 실행 에러 생성 헬퍼
    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
