//! # pilot-foundation
//!
//! Foundation layer for Pilot:
//! - Error: 공통 에러 타입
//! - Event: 에이전트별 이벤트 버스와 이벤트 이름 체계
//! - Config: 통합 설정 (PilotConfig)
//! - Core: 핵심 Trait 정의 (Tool, Sandbox, LlmClient)와 메시지/메모리
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  TaskRegistry ──subscribe──▶ EventBus (agent당 하나)     │
//! │                                  ▲                      │
//! │                                  │ emit                 │
//! │                               Agent                     │
//! │                     ┌────────────┼────────────┐         │
//! │                     ▼            ▼            ▼         │
//! │                 LlmClient      Tool        Sandbox      │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod event;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Core (핵심 Trait 및 타입)
// ============================================================================
pub use core::{
    CommandOutput, LlmClient, LlmResponse, Memory, Message, Role, Sandbox, Tool, ToolCall,
    ToolChoice, ToolResult,
};

// ============================================================================
// Event
// ============================================================================
pub use event::{names, EmitOptions, Event, EventBus, EventBusConfig, EventHandler, EventId, FnHandler};

// ============================================================================
// Config
// ============================================================================
pub use config::PilotConfig;
