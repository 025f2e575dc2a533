//! File Operator Tool - 샌드박스 파일 읽기/쓰기/확인
//!
//! 경로는 샌드박스 작업 디렉토리 안으로 제한됩니다.
//! 상대 경로는 작업 디렉토리 기준으로 해석합니다.

use async_trait::async_trait;
use pilot_foundation::{Result, Sandbox, Tool, ToolResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

const DESCRIPTION: &str = "A tool for performing file operations inside the workspace.
Provides functionality for reading, writing, and checking file properties.";

/// 파일 작업 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCommand {
    Read,
    Write,
    IsDirectory,
    Exists,
}

/// File Operator 입력
#[derive(Debug, Deserialize)]
pub struct FileOperatorInput {
    pub command: FileCommand,
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// File Operator 도구
pub struct FileOperatorTool {
    sandbox: Arc<dyn Sandbox>,
}

impl FileOperatorTool {
    /// 도구 이름
    pub const NAME: &'static str = "file_operator";

    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self { sandbox }
    }

    async fn run(&self, input: FileOperatorInput) -> std::result::Result<String, String> {
        let path = resolve_in_work_dir(self.sandbox.work_dir(), &input.path)?;

        match input.command {
            FileCommand::Read => self
                .sandbox
                .read_file(&path)
                .await
                .map_err(|e| format!("Failed to read {}: {}", input.path, e)),
            FileCommand::Write => {
                let content = input
                    .content
                    .ok_or("Parameter 'content' is required for 'write' command")?;
                self.sandbox
                    .write_file(&path, &content)
                    .await
                    .map_err(|e| format!("Failed to write to {}: {}", input.path, e))?;
                Ok(format!("Successfully wrote to {}", input.path))
            }
            FileCommand::IsDirectory => self
                .sandbox
                .is_directory(&path)
                .await
                .map(|b| b.to_string())
                .map_err(|e| e.to_string()),
            FileCommand::Exists => self
                .sandbox
                .exists(&path)
                .await
                .map(|b| b.to_string())
                .map_err(|e| e.to_string()),
        }
    }
}

/// 작업 디렉토리 안의 절대 경로로 변환
///
/// `..` 구성요소나 작업 디렉토리 밖의 절대 경로는 거부합니다.
pub fn resolve_in_work_dir(work_dir: &str, path: &str) -> std::result::Result<String, String> {
    let root = Path::new(work_dir);
    let candidate = Path::new(path);

    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(format!("Path {} must not contain '..'", path));
    }

    let full: PathBuf = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    if !full.starts_with(root) {
        return Err(format!(
            "Path {} is outside of the workspace {}",
            path, work_dir
        ));
    }

    Ok(full.to_string_lossy().into_owned())
}

#[async_trait]
impl Tool for FileOperatorTool {
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
                    "description": "The file operation command to execute.",
                    "enum": ["read", "write", "is_directory", "exists"]
                },
                "path": {
                    "type": "string",
                    "description": "The path to the file or directory, inside the workspace."
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file. Required for 'write' command."
                }
            },
            "required": ["command", "path"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let parsed: FileOperatorInput = match serde_json::from_value(input) {
            Ok(parsed) => parsed,
            Err(e) => return Ok(ToolResult::error(format!("Invalid input: {}", e))),
        };

        Ok(match self.run(parsed).await {
            Ok(output) => ToolResult::success(output),
            Err(e) => ToolResult::error(e),
        })
    }
}
