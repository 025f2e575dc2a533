//! Core Module - 핵심 인터페이스 및 타입
//!
//! ## 타입 계층
//!
//! - `types.rs`: 데이터 타입 (Message, ToolCall, CommandOutput 등)
//! - `traits.rs`: 인터페이스 (Tool, Sandbox, LlmClient)
//! - `memory.rs`: 에이전트 대화 기록

pub mod memory;
pub mod traits;
pub mod types;

pub use memory::{Memory, DEFAULT_MAX_MESSAGES};
pub use traits::{LlmClient, Sandbox, Tool, ToolResult};
pub use types::{CommandOutput, LlmResponse, Message, Role, ToolCall, ToolChoice};
