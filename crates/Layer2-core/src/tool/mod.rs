//! Tool System - 에이전트 도구
//!
//! - `ToolCollection`: 에이전트 하나의 도구 모음 (순서 유지, 이름 조회)
//! - `builtin`: 샌드박스 기반 내장 도구 (bash, file_operator, terminate)
//!
//! MCP 원격 도구는 `crate::mcp::McpConnectionHost`가 만들어 같은 모음에 추가합니다.

pub mod builtin;
mod collection;

pub use builtin::{
    create_builtin, resolve_in_work_dir, BashTool, FileOperatorTool, TerminateTool,
    BUILTIN_TOOL_NAMES,
};
pub use collection::ToolCollection;
