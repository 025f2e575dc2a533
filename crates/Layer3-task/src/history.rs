//! Progress History - task별 이벤트 기록
//!
//! 에이전트 버스의 모든 이벤트를 도착 순서대로 쌓아 둡니다.
//! 각 레코드의 `index`는 기록 시점의 history 길이이며 0부터 빈틈없이 증가합니다.
//! 구독자는 커서(다음에 읽을 index)만 들고 있으면 언제든 이어서 읽을 수 있습니다.

use async_trait::async_trait;
use parking_lot::RwLock;
use pilot_foundation::{Event, EventHandler, EventId, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

// ============================================================================
// Record
// ============================================================================

/// 레코드 종류 (현재는 progress 하나)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Progress,
}

/// 스트림으로 내보내는 progress 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// history 안의 위치
    pub index: usize,

    /// 원본 이벤트 ID
    pub id: EventId,

    pub parent_id: Option<EventId>,

    #[serde(rename = "type")]
    pub kind: RecordKind,

    pub name: String,
    pub step: u32,
    pub content: Value,
}

impl ProgressRecord {
    fn from_event(index: usize, event: &Event) -> Self {
        Self {
            index,
            id: event.id.clone(),
            parent_id: event.parent_id.clone(),
            kind: RecordKind::Progress,
            name: event.name.clone(),
            step: event.step,
            content: event.content.clone(),
        }
    }
}

// ============================================================================
// History
// ============================================================================

/// 공유 가능한 append-only 이벤트 기록
#[derive(Debug, Clone, Default)]
pub struct TaskHistory {
    records: Arc<RwLock<Vec<ProgressRecord>>>,
}

impl TaskHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이벤트를 기록하고 부여된 index 반환
    pub fn append(&self, event: &Event) -> usize {
        let mut records = self.records.write();
        let index = records.len();
        records.push(ProgressRecord::from_event(index, event));
        index
    }

    /// `cursor`부터 끝까지의 레코드
    ///
    /// 커서가 길이를 넘으면 빈 목록입니다.
    pub fn since(&self, cursor: usize) -> Vec<ProgressRecord> {
        let records = self.records.read();
        records.get(cursor..).map(<[_]>::to_vec).unwrap_or_default()
    }

    /// 전체 스냅샷
    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

// ============================================================================
// Recorder
// ============================================================================

/// 버스 이벤트를 history에 쌓는 핸들러
pub struct ProgressRecorder {
    task_id: String,
    history: TaskHistory,
}

impl ProgressRecorder {
    pub fn new(task_id: impl Into<String>, history: TaskHistory) -> Self {
        Self {
            task_id: task_id.into(),
            history,
        }
    }
}

#[async_trait]
impl EventHandler for ProgressRecorder {
    fn name(&self) -> &str {
        "progress-recorder"
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let index = self.history.append(event);
        tracing::trace!(task_id = %self.task_id, index, event = %event.name, "Recorded progress");
        Ok(())
    }
}
