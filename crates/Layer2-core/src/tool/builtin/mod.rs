//! Builtin Tools - 내장 도구들
//!
//! 모든 내장 도구는 샌드박스를 통해서만 동작합니다.
//!
//! ## 도구 목록
//! - `bash` - 샌드박스 Shell 명령 실행
//! - `file_operator` - 워크스페이스 파일 읽기/쓰기/확인
//! - `terminate` - 작업 종료 신호

pub mod bash;
pub mod file_operator;
pub mod terminate;

pub use bash::BashTool;
pub use file_operator::{resolve_in_work_dir, FileOperatorTool};
pub use terminate::TerminateTool;

use pilot_foundation::{Sandbox, Tool};
use std::sync::Arc;

/// 요청으로 선택 가능한 내장 도구 이름
pub const BUILTIN_TOOL_NAMES: &[&str] = &[BashTool::NAME, FileOperatorTool::NAME];

/// 이름으로 내장 도구 생성
pub fn create_builtin(name: &str, sandbox: Arc<dyn Sandbox>) -> Option<Arc<dyn Tool>> {
    match name {
        BashTool::NAME => Some(Arc::new(BashTool::new(sandbox))),
        FileOperatorTool::NAME => Some(Arc::new(FileOperatorTool::new(sandbox))),
        TerminateTool::NAME => Some(Arc::new(TerminateTool::new())),
        _ => None,
    }
}
