//! Pilot Config - 통합 설정
//!
//! ## 검색 우선순위
//!
//! 1. 명시적 경로 (`--config`)
//! 2. User-level: `<config_dir>/pilot/config.toml`
//! 3. 기본값
//!
//! 파일을 읽은 뒤 `PILOT_*` 환경 변수가 개별 값을 덮어씁니다.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// 설정 폴더 이름
pub const CONFIG_DIR_NAME: &str = "pilot";

/// 설정 파일명
pub const CONFIG_FILE_NAME: &str = "config.toml";

// ============================================================================
// PilotConfig (통합)
// ============================================================================

/// Pilot 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub agent: AgentSettings,
    pub stream: StreamSettings,
    pub sandbox: SandboxSettings,
    pub llm: LlmSettings,
    pub server: ServerSettings,
    pub mcp: McpSettings,
}

impl PilotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 설정 로드
    ///
    /// `path`가 주어지면 해당 파일이 반드시 존재해야 하고, 없으면 user-level 파일을
    /// 찾은 뒤 그것도 없으면 기본값을 사용합니다. 마지막으로 환경 변수를 적용합니다.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::user_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// 실행할 수 없는 값 거부
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_steps == 0 {
            return Err(Error::Config("agent.max_steps must be at least 1".to_string()));
        }
        if self.agent.duplicate_threshold == 0 {
            return Err(Error::Config(
                "agent.duplicate_threshold must be at least 1".to_string(),
            ));
        }
        if self.stream.heartbeat_interval_secs == 0 || self.stream.poll_interval_ms == 0 {
            return Err(Error::Config(
                "stream.heartbeat_interval_secs and stream.poll_interval_ms must be positive"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// 파일에서 로드
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// TOML 문자열에서 파싱
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// User-level 설정 파일 경로
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// 프로세스 환경 변수 적용
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// 주어진 조회 함수로 환경 변수 적용
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PILOT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = lookup("PILOT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("PILOT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("PILOT_WORKSPACE_ROOT") {
            self.sandbox.workspace_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("PILOT_SANDBOX_IMAGE") {
            self.sandbox.image = v;
        }
        if let Some(v) = lookup("PILOT_HOST") {
            self.server.host = v;
        }
        if let Some(port) = lookup("PILOT_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(steps) = lookup("PILOT_MAX_STEPS").and_then(|v| v.parse().ok()) {
            self.agent.max_steps = steps;
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// 에이전트 기본값
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// 최대 step 수
    pub max_steps: u32,

    /// 같은 assistant 응답이 몇 번 반복되면 stuck으로 볼지
    pub duplicate_threshold: usize,

    /// 메모리에 유지할 최대 메시지 수
    pub max_messages: usize,

    /// 응답 언어
    pub language: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 20,
            duplicate_threshold: 2,
            max_messages: 100,
            language: "English".to_string(),
        }
    }
}

/// 이벤트 스트림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub heartbeat_interval_secs: u64,
    pub poll_interval_ms: u64,
    /// 완료된 task를 레지스트리에 유지하는 시간
    pub retention_secs: u64,
}

impl StreamSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 5,
            poll_interval_ms: 500,
            retention_secs: 1800,
        }
    }
}

/// 샌드박스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// 컨테이너 이미지
    pub image: String,

    /// 호스트 쪽 워크스페이스 루트 (컨테이너의 `work_dir`에 마운트)
    pub workspace_root: PathBuf,

    /// 컨테이너 안의 워크스페이스 경로
    pub work_dir: String,

    /// 메모리 제한 (MB)
    pub memory_limit_mb: Option<u64>,

    /// CPU 제한 (코어 수)
    pub cpu_limit: Option<f64>,

    /// 기본 명령 타임아웃 (초)
    pub command_timeout_secs: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        let workspace_root = dirs::data_local_dir()
            .map(|d| d.join(CONFIG_DIR_NAME).join("workspace"))
            .unwrap_or_else(|| PathBuf::from("/tmp/pilot/workspace"));

        Self {
            image: "python:3.12-slim".to_string(),
            workspace_root,
            work_dir: "/workspace".to_string(),
            memory_limit_mb: None,
            cpu_limit: None,
            command_timeout_secs: 300,
        }
    }
}

/// LLM 설정 (OpenAI 호환 API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

/// HTTP 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// MCP 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpSettings {
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl McpSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PilotConfig::new();
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.agent.duplicate_threshold, 2);
        assert_eq!(config.agent.max_messages, 100);
        assert_eq!(config.stream.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.stream.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.stream.retention(), Duration::from_secs(1800));
        assert_eq!(config.sandbox.work_dir, "/workspace");
        assert_eq!(config.mcp.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PilotConfig::from_toml(
            r#"
            [agent]
            max_steps = 7

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.max_steps, 7);
        assert_eq!(config.agent.language, "English");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[stream]\nheartbeat_interval_secs = 2").unwrap();

        let config = PilotConfig::from_file(file.path()).unwrap();
        assert_eq!(config.stream.heartbeat_interval_secs, 2);
        assert_eq!(config.stream.poll_interval_ms, 500);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PilotConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(PilotConfig::from_toml("[agent\nmax_steps = ").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("PILOT_PORT", "8088"),
            ("PILOT_MAX_STEPS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = PilotConfig::new();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.agent.max_steps, 20);
    }

    #[test]
    fn test_zero_max_steps_rejected_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_steps = 0").unwrap();

        // 파싱 자체는 되지만 load에서 거부
        assert_eq!(PilotConfig::from_file(file.path()).unwrap().agent.max_steps, 0);
        let err = PilotConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn test_validate() {
        assert!(PilotConfig::new().validate().is_ok());

        let mut config = PilotConfig::new();
        config.apply_env_from(|k| (k == "PILOT_MAX_STEPS").then(|| "0".to_string()));
        assert!(config.validate().is_err());

        let mut config = PilotConfig::new();
        config.stream.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
