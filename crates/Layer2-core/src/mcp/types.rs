//! MCP Types - 프로토콜 타입과 연결 설정

use pilot_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// MCP 도구 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// 도구 이름
    pub name: String,

    /// 도구 설명
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 입력 스키마 (JSON Schema)
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// MCP 도구 호출 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    /// 에러 여부
    #[serde(default, rename = "isError")]
    pub is_error: bool,

    /// 결과 콘텐츠
    #[serde(default)]
    pub content: Vec<McpContent>,
}

/// MCP 콘텐츠
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    /// 텍스트 콘텐츠
    Text { text: String },

    /// 이미지 콘텐츠
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    /// 리소스 참조
    Resource { resource: Value },
}

impl McpToolResult {
    /// 텍스트 콘텐츠를 ", "로 이어 붙인 결과 (없으면 안내 문구)
    pub fn joined_text(&self) -> String {
        let joined = self
            .content
            .iter()
            .filter_map(|c| match c {
                McpContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", ");

        if joined.is_empty() {
            "No output returned.".to_string()
        } else {
            joined
        }
    }
}

/// 서버 정보 (initialize 응답)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

// ============================================================================
// 연결 설정
// ============================================================================

/// 전송 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// 로컬 명령 파이프
    Stdio,
    /// 네트워크 스트림
    Sse,
}

/// MCP 전송 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpTransportConfig {
    /// stdio 전송 (로컬 프로세스)
    Stdio {
        /// 실행 명령어
        command: String,
        /// 인자
        #[serde(default)]
        args: Vec<String>,
        /// 환경 변수
        #[serde(default)]
        env: BTreeMap<String, String>,
    },

    /// SSE 전송 (HTTP)
    Sse {
        /// 서버 URL
        url: String,
        /// 추가 헤더
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl McpTransportConfig {
    pub fn kind(&self) -> TransportKind {
        match self {
            McpTransportConfig::Stdio { .. } => TransportKind::Stdio,
            McpTransportConfig::Sse { .. } => TransportKind::Sse,
        }
    }
}

/// 요청으로 들어오는 MCP 도구 서버 지정
///
/// `url`이 있으면 SSE, 없으면 `command`로 stdio 연결합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerSpec {
    /// 클라이언트 ID (도구 이름 접두사)
    pub id: String,

    /// 표시 이름
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl McpServerSpec {
    /// 전송 설정으로 변환
    pub fn transport(&self) -> Result<McpTransportConfig> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidRequest("MCP server id is required".to_string()));
        }

        match (non_empty(&self.url), non_empty(&self.command)) {
            (Some(url), _) => Ok(McpTransportConfig::Sse {
                url: url.to_string(),
                headers: self.headers.clone(),
            }),
            (None, Some(command)) => Ok(McpTransportConfig::Stdio {
                command: command.to_string(),
                args: self.args.clone(),
                env: self.env.clone(),
            }),
            (None, None) => Err(Error::InvalidRequest(format!(
                "MCP server '{}' needs either a url or a command",
                self.id
            ))),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
