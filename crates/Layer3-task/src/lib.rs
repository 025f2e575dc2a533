//! # pilot-task
//!
//! Task 관리 레이어
//!
//! - **TaskRegistry**: task id별 에이전트 실행, 종료, 목록, 보존 기간 후 제거
//! - **TaskHistory**: 에이전트 이벤트를 index가 붙은 progress 레코드로 기록
//! - **Stream**: 커서 기반 구독, heartbeat, 완료 시 종료

pub mod history;
pub mod registry;
pub mod stream;

pub use history::{ProgressRecord, ProgressRecorder, RecordKind, TaskHistory};
pub use registry::{TaskInfo, TaskRegistry, TaskStatus};
pub use stream::{StreamItem, TASK_NOT_FOUND};
