//! Config - 통합 설정 관리
//!
//! - `pilot.rs` - PilotConfig 통합 설정 (TOML + 환경 변수)

mod pilot;

pub use pilot::{
    AgentSettings, LlmSettings, McpSettings, PilotConfig, SandboxSettings, ServerSettings,
    StreamSettings, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
};
