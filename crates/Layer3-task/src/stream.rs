//! Stream Distributor - task 이벤트를 구독자에게 흘려보내기
//!
//! 구독자는 각자 커서를 들고 history를 주기적으로 읽습니다.
//! 새 이벤트가 `heartbeat_interval` 동안 없으면 heartbeat를 하나 보내고,
//! 완료 계열 이벤트(complete/terminated/error)를 보낸 직후 스트림을 닫습니다.

use crate::history::ProgressRecord;
use crate::registry::TaskRegistry;
use async_stream::stream;
use futures::Stream;
use pilot_foundation::event::names;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::debug;

/// 알 수 없는 task에 대한 에러 메시지
pub const TASK_NOT_FOUND: &str = "Task not found";

// ============================================================================
// Stream item
// ============================================================================

/// 구독 스트림 항목
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Progress(ProgressRecord),
    Heartbeat,
    Error { message: String },
}

impl StreamItem {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat)
    }

    /// 전송용 JSON 페이로드 (heartbeat는 빈 레코드라 없음)
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Progress(record) => serde_json::to_value(record).ok(),
            Self::Heartbeat => None,
            Self::Error { message } => Some(json!({"message": message})),
        }
    }
}

// ============================================================================
// Subscribe
// ============================================================================

impl TaskRegistry {
    /// 처음부터 구독
    pub fn subscribe(&self, task_id: &str) -> impl Stream<Item = StreamItem> + Send + 'static {
        self.subscribe_from(task_id, 0)
    }

    /// `cursor` 위치부터 구독
    ///
    /// 이미 지나간 커서를 주면 그 위치부터 다시 보냅니다.
    /// task가 없으면 에러 항목 하나를 보내고 끝납니다.
    pub fn subscribe_from(
        &self,
        task_id: &str,
        cursor: usize,
    ) -> impl Stream<Item = StreamItem> + Send + 'static {
        let registry = self.clone();
        let task_id = task_id.to_string();
        let heartbeat = self.settings().heartbeat_interval();
        let poll = self.settings().poll_interval();

        stream! {
            let Some((history, generation)) = registry.history_handle(&task_id).await else {
                yield StreamItem::error(TASK_NOT_FOUND);
                return;
            };

            debug!(task_id = %task_id, cursor, "Stream subscriber attached");
            let mut cursor = cursor;
            let mut last_sent = Instant::now();

            loop {
                let records = history.since(cursor);

                if records.is_empty() {
                    if last_sent.elapsed() >= heartbeat {
                        yield StreamItem::Heartbeat;
                        last_sent = Instant::now();
                    }

                    // 보존 기간이 지나 제거된 task
                    if !registry.is_current(&task_id, generation).await {
                        debug!(task_id = %task_id, "Task removed, closing stream");
                        return;
                    }
                } else {
                    for record in records {
                        cursor = record.index + 1;
                        let terminal = names::is_terminal(&record.name);
                        yield StreamItem::Progress(record);

                        if terminal {
                            debug!(task_id = %task_id, "Task finished, closing stream");
                            return;
                        }
                    }
                    last_sent = Instant::now();
                }

                sleep(poll).await;
            }
        }
    }
}
