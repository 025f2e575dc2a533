//! Core Traits - 핵심 인터페이스 정의
//!
//! Layer2 이상에서 구현해야 하는 trait들을 정의합니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Layer3-Agent                                               │
//! │  └── think/act 루프가 아래 trait들만 사용                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Layer2-Core / Provider / Sandbox                           │
//! │  ├── Tool 구현 (bash, file_operator, terminate, MCP 도구)    │
//! │  ├── LlmClient 구현 (OpenAI 호환)                            │
//! │  └── Sandbox 구현 (Docker 컨테이너)                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Layer1-Foundation (이 레이어)                              │
//! │  └── Trait 정의 (Tool, Sandbox, LlmClient)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use super::types::{CommandOutput, LlmResponse, Message, ToolChoice};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Tool Trait - 도구 인터페이스
// ============================================================================

/// 도구 실행 결과
///
/// 실패도 에러가 아니라 결과로 돌려줘서 에이전트 루프가 계속 진행되게 합니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResult {
    /// 출력 내용
    pub output: String,
    /// 에러 메시지 (실패 시)
    pub error: Option<String>,
    /// 시스템 메시지 (LLM에게 추가로 전달할 안내)
    pub system: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl fmt::Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "Error: {}", error),
            None => f.write_str(&self.output),
        }
    }
}

/// 도구 인터페이스
///
/// 내장 도구와 MCP 원격 도구가 같은 trait으로 노출됩니다.
#[async_trait]
pub trait Tool: Send + Sync {
    /// 도구 이름 (고유 식별자)
    fn name(&self) -> &str;

    /// 설명 (LLM에게 노출)
    fn description(&self) -> &str;

    /// 파라미터 JSON 스키마
    fn parameters(&self) -> Value;

    /// 도구 실행
    async fn execute(&self, input: Value) -> Result<ToolResult>;

    /// OpenAI function calling 형식
    fn to_param(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }
}

// ============================================================================
// Sandbox - 격리 실행 환경
// ============================================================================

/// 격리 실행 환경
///
/// 실행/읽기/쓰기만 노출합니다. 나머지 조회는 `run_command` 위에 기본 구현됩니다.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// 샌드박스 ID (컨테이너 이름으로도 사용)
    fn id(&self) -> &str;

    /// 컨테이너 안의 작업 디렉토리
    fn work_dir(&self) -> &str;

    /// 호스트 쪽 워크스페이스 경로 (MCP 컨테이너 볼륨 마운트용)
    fn host_workspace(&self) -> &Path;

    /// 명령 실행
    async fn run_command(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput>;

    /// 파일 읽기
    async fn read_file(&self, path: &str) -> Result<String>;

    /// 파일 쓰기
    async fn write_file(&self, path: &str, content: &str) -> Result<()>;

    /// 디렉토리 여부
    async fn is_directory(&self, path: &str) -> Result<bool> {
        let output = self
            .run_command(&format!("test -d {}", quote(path)?), None)
            .await?;
        Ok(output.success())
    }

    /// 존재 여부
    async fn exists(&self, path: &str) -> Result<bool> {
        let output = self
            .run_command(&format!("test -e {}", quote(path)?), None)
            .await?;
        Ok(output.success())
    }
}

fn quote(path: &str) -> Result<String> {
    shlex::try_quote(path)
        .map(|q| q.into_owned())
        .map_err(|e| Error::InvalidRequest(format!("invalid path '{}': {}", path, e)))
}

// ============================================================================
// LlmClient - 언어 모델 호출
// ============================================================================

/// 언어 모델 클라이언트
///
/// 누적 토큰 카운터는 단조 증가해야 합니다. 에이전트가 step 사이의 차이를 계산합니다.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 일반 응답
    async fn ask(&self, messages: &[Message], system: Option<&str>) -> Result<String>;

    /// 도구 호출이 가능한 응답
    async fn ask_tool(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[Value],
        tool_choice: ToolChoice,
    ) -> Result<LlmResponse>;

    /// 누적 입력 토큰
    fn total_input_tokens(&self) -> u64;

    /// 누적 출력 토큰
    fn total_completion_tokens(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    struct RecordingSandbox {
        commands: Mutex<Vec<String>>,
        root: PathBuf,
    }

    #[async_trait]
    impl Sandbox for RecordingSandbox {
        fn id(&self) -> &str {
            "sandbox-test"
        }

        fn work_dir(&self) -> &str {
            "/workspace"
        }

        fn host_workspace(&self) -> &Path {
            &self.root
        }

        async fn run_command(&self, command: &str, _timeout: Option<Duration>) -> Result<CommandOutput> {
            self.commands.lock().push(command.to_string());
            Ok(CommandOutput {
                exit_code: if command.contains("missing") { 1 } else { 0 },
                ..Default::default()
            })
        }

        async fn read_file(&self, _path: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn write_file(&self, _path: &str, _content: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_path_checks_quote_paths() {
        let sandbox = RecordingSandbox {
            commands: Mutex::new(Vec::new()),
            root: PathBuf::from("/tmp"),
        };

        assert!(sandbox.is_directory("/workspace/my dir").await.unwrap());
        assert!(!sandbox.exists("/workspace/missing").await.unwrap());

        let commands = sandbox.commands.lock();
        assert!(commands[0].starts_with("test -d "));
        assert_ne!(commands[0], "test -d /workspace/my dir");
        assert_eq!(commands[1], "test -e /workspace/missing");
    }

    #[test]
    fn test_tool_result_display() {
        assert_eq!(ToolResult::success("ok").to_string(), "ok");
        assert_eq!(ToolResult::error("boom").to_string(), "Error: boom");
        assert!(ToolResult::error("boom").is_error());
    }
}
