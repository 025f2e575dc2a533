//! # pilot-provider
//!
//! LLM client layer for Pilot.
//!
//! ## Features
//! - OpenAI 호환 Chat Completions (`base_url`로 호환 API 지정)
//! - Tool/function calling 지원
//! - 일시적 실패 자동 재시도 (exponential backoff)
//! - 누적 토큰 사용량 (`LlmClient::total_input_tokens` 등)

pub mod error;
pub mod openai;
pub mod retry;

pub use error::ProviderError;
pub use openai::OpenAiClient;
pub use retry::{RetryClassification, RetryPolicy, RetryableError};
