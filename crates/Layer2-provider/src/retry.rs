//! Retry logic with exponential backoff
//!
//! 일시적인 LLM API 실패(5xx, 네트워크, rate limit)만 재시도합니다.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 재시도 정책
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 최대 재시도 횟수 (첫 시도 제외)
    pub max_retries: u32,

    /// 첫 재시도 전 대기
    pub initial_delay: Duration,

    /// 대기 시간 배수
    pub backoff_multiplier: f64,

    /// 대기 상한
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// n번째 재시도 전 대기 시간 (0부터)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// 정책에 따라 비동기 작업 실행
    pub async fn run<T, E, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        E: RetryableError + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let delay = match err.classify() {
                RetryClassification::NoRetry => {
                    debug!("{}: non-retryable error: {}", operation_name, err);
                    return Err(err);
                }
                _ if attempt >= self.max_retries => {
                    warn!(
                        "{}: giving up after {} retries: {}",
                        operation_name, self.max_retries, err
                    );
                    return Err(err);
                }
                RetryClassification::RateLimited {
                    retry_after_ms: Some(ms),
                } => Duration::from_millis(ms),
                _ => self.delay_for_attempt(attempt),
            };

            warn!(
                "{}: attempt {} failed, retrying in {:?}: {}",
                operation_name,
                attempt + 1,
                delay,
                err
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

/// 재시도 판단 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClassification {
    Retry,
    NoRetry,
    /// 서버가 대기 시간을 알려준 경우 그 값을 사용
    RateLimited { retry_after_ms: Option<u64> },
}

/// 재시도 분류가 가능한 에러
pub trait RetryableError {
    fn classify(&self) -> RetryClassification;
}
