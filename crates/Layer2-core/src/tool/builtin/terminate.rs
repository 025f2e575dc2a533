//! Terminate Tool - 작업 종료 신호
//!
//! 실행 자체는 안내 문구만 돌려줍니다. 에이전트가 이 도구 호출을 보고
//! 종료 플래그를 세웁니다.

use async_trait::async_trait;
use pilot_foundation::{Result, Tool, ToolResult};
use serde_json::{json, Value};

const DESCRIPTION: &str = "Terminate the interaction when the request is met OR if the assistant cannot proceed further with the task.
When you have finished all the tasks, call this tool to end the work.";

/// Terminate 도구
#[derive(Debug, Default)]
pub struct TerminateTool;

impl TerminateTool {
    /// 도구 이름
    pub const NAME: &'static str = "terminate";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for TerminateTool {
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
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let status = input
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("success");
        Ok(ToolResult::success(format!(
            "The interaction has been completed with status: {}",
            status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_message() {
        let result = TerminateTool::new()
            .execute(json!({"status": "failure"}))
            .await
            .unwrap();
        assert_eq!(
            result.output,
            "The interaction has been completed with status: failure"
        );
    }
}
