//! Provider-specific error types
//!
//! ProviderError는 LLM API 호출의 세부 에러를 관리합니다.
//! 에이전트 쪽으로는 `pilot_foundation::Error`로 변환되어 전달됩니다.

use crate::retry::{RetryClassification, RetryableError};
use pilot_foundation::Error as FoundationError;
use thiserror::Error;

/// LLM 호출 중 발생하는 에러
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// API key 누락 또는 거부
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded{}", .retry_after_ms.map(|ms| format!(", retry after {}ms", ms)).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    /// 컨텍스트 길이 초과
    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// 서버 에러 (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// 네트워크 에러 (연결 실패, 타임아웃 등)
    #[error("Network error: {0}")]
    Network(String),

    /// 잘못된 요청
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 해석할 수 없는 응답
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// 필수 설정 누락
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl RetryableError for ProviderError {
    fn classify(&self) -> RetryClassification {
        match self {
            ProviderError::RateLimited { retry_after_ms } => RetryClassification::RateLimited {
                retry_after_ms: *retry_after_ms,
            },
            ProviderError::ServerError(_) | ProviderError::Network(_) => RetryClassification::Retry,
            _ => RetryClassification::NoRetry,
        }
    }
}

impl ProviderError {
    /// HTTP 상태 코드와 본문으로 분류
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(body.to_string()),
            429 => ProviderError::RateLimited {
                retry_after_ms: extract_retry_after(body),
            },
            400 => {
                if body.contains("context") || body.contains("too long") {
                    ProviderError::ContextLengthExceeded(body.to_string())
                } else {
                    ProviderError::InvalidRequest(body.to_string())
                }
            }
            404 => ProviderError::ModelNotFound(body.to_string()),
            500..=599 => ProviderError::ServerError(body.to_string()),
            _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
        }
    }
}

/// 에러 본문의 `error.retry_after` (초)를 밀리초로
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let secs = json.get("error")?.get("retry_after")?.as_f64()?;
    Some((secs * 1000.0) as u64)
}

// ============================================================================
// pilot_foundation::Error 변환
// ============================================================================

impl From<ProviderError> for FoundationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Network(msg) => FoundationError::Http(msg),
            ProviderError::InvalidRequest(msg) => FoundationError::InvalidRequest(msg),
            ProviderError::NotConfigured(msg) => FoundationError::Config(msg),
            other => FoundationError::Llm(other.to_string()),
        }
    }
}
