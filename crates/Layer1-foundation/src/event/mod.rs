//! Event System - 에이전트 이벤트 발행/구독
//!
//! 에이전트 하나당 버스 하나. 생명주기, 상태 전이, step 진행이 모두 이벤트로 발행됩니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        EventBus                           │
//! │  emit(event) ──▶ [ unbounded queue ] ──▶ dispatch task    │
//! │                                              │            │
//! │                       regex 매칭, 구독 순서대로 순차 실행   │
//! │                 ┌────────────┬───────────────┴──┐         │
//! │                 ▼            ▼                  ▼         │
//! │            Recorder      Logger   ...       Handler N     │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용법
//!
//! ```ignore
//! use pilot_foundation::event::{names, EventBus, FnHandler};
//!
//! let bus = EventBus::new();
//! bus.subscribe(names::MATCH_ALL, Arc::new(FnHandler::new("log", |e| {
//!     tracing::info!(event = %e.name);
//!     Ok(())
//! })))?;
//! ```

pub mod bus;
pub mod names;
pub mod types;

// Re-exports
pub use bus::{EventBus, EventBusConfig, EventHandler, FnHandler, SubscriptionId};
pub use types::{EmitOptions, Event, EventId};
