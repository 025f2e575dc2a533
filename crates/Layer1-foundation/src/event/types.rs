//! Event Types - 에이전트 이벤트 정의
//!
//! 에이전트가 발행하는 모든 이벤트는 `Event` 하나로 표현됩니다.
//! 이름은 `agent:lifecycle:step:think:start` 처럼 `:`로 구분된 계층 경로입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Event ID
// ============================================================================

/// 이벤트 고유 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// 새 이벤트 ID 생성
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event
// ============================================================================

/// 불변 이벤트
///
/// 생성 이후 변경되지 않으며, 순서는 timestamp가 아니라 발행 순서로 정해집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 이벤트 ID
    pub id: EventId,

    /// 부모 이벤트 ID (도구 호출 이벤트를 step 이벤트에 묶을 때 사용)
    pub parent_id: Option<EventId>,

    /// 계층 이름 (`agent:lifecycle:...`)
    pub name: String,

    /// 발행 시점의 step 번호
    pub step: u32,

    /// 발행 시각
    pub timestamp: DateTime<Utc>,

    /// 구조화된 페이로드
    pub content: Value,
}

impl Event {
    /// 새 이벤트 생성 (ID 자동 생성)
    pub fn new(name: impl Into<String>, step: u32, content: Value) -> Self {
        Self::with_options(name, step, content, EmitOptions::default())
    }

    /// 옵션과 함께 생성
    pub fn with_options(
        name: impl Into<String>,
        step: u32,
        content: Value,
        options: EmitOptions,
    ) -> Self {
        Self {
            id: options.id.unwrap_or_default(),
            parent_id: options.parent_id,
            name: name.into(),
            step,
            timestamp: Utc::now(),
            content,
        }
    }
}

/// `emit` 옵션 - 호출자가 ID나 부모 ID를 지정할 때 사용
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    pub id: Option<EventId>,
    pub parent_id: Option<EventId>,
}

impl EmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<EventId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_generates_id_when_absent() {
        let a = Event::new("agent:lifecycle:start", 0, json!({}));
        let b = Event::new("agent:lifecycle:start", 0, json!({}));
        assert_ne!(a.id, b.id);
        assert!(a.parent_id.is_none());
    }

    #[test]
    fn test_event_keeps_given_ids() {
        let event = Event::with_options(
            "agent:lifecycle:step:act:tool:start",
            3,
            json!({"name": "bash"}),
            EmitOptions::new().with_id("call-1").with_parent("step-3"),
        );

        assert_eq!(event.id.as_str(), "call-1");
        assert_eq!(event.parent_id, Some(EventId::from("step-3")));
        assert_eq!(event.step, 3);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["id"], "call-1");
        assert_eq!(value["parent_id"], "step-3");
    }
}
