//! Bash Tool - 샌드박스 안에서 Shell 명령 실행
//!
//! - 샌드박스 컨테이너에서 실행 (호스트 직접 실행 없음)
//! - 타임아웃 지원 (초 단위, 기본 300초)
//! - 종료 코드가 0이 아니면 system 메시지로 전달

use async_trait::async_trait;
use pilot_foundation::{Result, Sandbox, Tool, ToolResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DESCRIPTION: &str = "Execute a bash command in the sandbox terminal.
* Long running commands: run them in the background and redirect output to a file, e.g. `python3 app.py > server.log 2>&1 &`.
* Timeout: if a command times out, retry running it in the background.";

/// Bash 도구 입력
#[derive(Debug, Deserialize)]
pub struct BashInput {
    /// 실행할 명령어
    #[serde(default)]
    pub command: Option<String>,

    /// 타임아웃 (초)
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Bash 도구
pub struct BashTool {
    sandbox: Arc<dyn Sandbox>,
    default_timeout: Duration,
}

impl BashTool {
    /// 도구 이름
    pub const NAME: &'static str = "bash";

    /// 기본 타임아웃 (5분)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self {
            sandbox,
            default_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute."
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds for the command execution (default 300)."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let parsed: BashInput = match serde_json::from_value(input) {
            Ok(parsed) => parsed,
            Err(e) => return Ok(ToolResult::error(format!("Invalid input: {}", e))),
        };

        let Some(command) = parsed.command.filter(|c| !c.trim().is_empty()) else {
            return Ok(ToolResult::error("no command provided."));
        };

        let timeout = parsed
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        match self.sandbox.run_command(&command, Some(timeout)).await {
            Ok(output) if output.success() => Ok(ToolResult::success(output.combined())),
            Ok(output) => Ok(ToolResult::success(output.combined())
                .with_system(format!("Command exited with code {}", output.exit_code))),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}
