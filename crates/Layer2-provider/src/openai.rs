//! OpenAI 호환 Chat Completions 클라이언트
//!
//! `base_url`만 바꾸면 Azure, vLLM, LocalAI 등 호환 API에도 사용할 수 있습니다.
//! 호출마다 사용량을 누적해 에이전트가 스텝별 토큰 증분을 계산할 수 있게 합니다.

use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use pilot_foundation::config::LlmSettings;
use pilot_foundation::{LlmClient, LlmResponse, Message, Result, ToolCall, ToolChoice};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// OpenAI 호환 LLM 클라이언트
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,

    total_input_tokens: AtomicU64,
    total_completion_tokens: AtomicU64,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            retry: RetryPolicy::default(),
            total_input_tokens: AtomicU64::new(0),
            total_completion_tokens: AtomicU64::new(0),
        })
    }

    /// 설정 섹션으로 생성 (API key 필수)
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::NotConfigured(
                    "api_key is required (set PILOT_API_KEY or OPENAI_API_KEY)".to_string(),
                )
            })?;

        Ok(Self::new(api_key, settings.model.clone())?
            .with_base_url(settings.base_url.clone())
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[Value],
        tool_choice: Option<ToolChoice>,
    ) -> ChatRequest {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            api_messages.push(ChatMessage::from(&Message::system(system)));
        }
        api_messages.extend(messages.iter().map(ChatMessage::from));

        let has_tools = !tools.is_empty();
        ChatRequest {
            model: self.model.clone(),
            messages: api_messages,
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            tools: has_tools.then(|| tools.to_vec()),
            tool_choice: tool_choice.filter(|_| has_tools),
        }
    }

    async fn complete(&self, request: &ChatRequest) -> std::result::Result<ChatChoiceMessage, ProviderError> {
        let response = self
            .retry
            .run("chat completion", || self.send(request))
            .await?;

        if let Some(usage) = &response.usage {
            self.record_usage(usage);
        }

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))
    }

    async fn send(&self, request: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error_response(status.as_u16(), &body));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    fn record_usage(&self, usage: &Usage) {
        let input = self
            .total_input_tokens
            .fetch_add(usage.prompt_tokens, Ordering::SeqCst)
            + usage.prompt_tokens;
        let completion = self
            .total_completion_tokens
            .fetch_add(usage.completion_tokens, Ordering::SeqCst)
            + usage.completion_tokens;
        debug!(
            "Token usage: input={} completion={} (cumulative input={} completion={})",
            usage.prompt_tokens, usage.completion_tokens, input, completion
        );
    }
}

/// 에러 응답 본문 해석
fn parse_error_response(status: u16, body: &str) -> ProviderError {
    if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(body) {
        let message = error_response.error.message;
        return match error_response.error.code.as_deref() {
            Some("context_length_exceeded") => ProviderError::ContextLengthExceeded(message),
            Some("invalid_api_key") => ProviderError::Authentication(message),
            Some("insufficient_quota") => ProviderError::QuotaExceeded(message),
            Some("model_not_found") => ProviderError::ModelNotFound(message),
            _ => ProviderError::from_http_status(status, &message),
        };
    }
    ProviderError::from_http_status(status, body)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn ask(&self, messages: &[Message], system: Option<&str>) -> Result<String> {
        let request = self.build_request(messages, system, &[], None);
        let message = self.complete(&request).await?;
        Ok(message.content.unwrap_or_default())
    }

    async fn ask_tool(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[Value],
        tool_choice: ToolChoice,
    ) -> Result<LlmResponse> {
        let request = self.build_request(messages, system, tools, Some(tool_choice));
        let message = self.complete(&request).await?;
        Ok(message.into_response())
    }

    fn total_input_tokens(&self) -> u64 {
        self.total_input_tokens.load(Ordering::SeqCst)
    }

    fn total_completion_tokens(&self) -> u64 {
        self.total_completion_tokens.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Chat Completions API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        let base = ChatMessage {
            role: msg.role().as_str(),
            content: Some(msg.content().to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        };

        match msg {
            Message::Assistant { tool_calls, .. } if !tool_calls.is_empty() => ChatMessage {
                tool_calls: Some(
                    tool_calls
                        .iter()
                        .map(|tc| WireToolCall {
                            id: tc.id.clone(),
                            call_type: function_type(),
                            function: WireFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect(),
                ),
                ..base
            },
            Message::Tool {
                tool_call_id, name, ..
            } => ChatMessage {
                tool_call_id: Some(tool_call_id.clone()),
                name: Some(name.clone()).filter(|n| !n.is_empty()),
                ..base
            },
            _ => base,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

impl ChatChoiceMessage {
    fn into_response(self) -> LlmResponse {
        LlmResponse {
            content: self.content.unwrap_or_default(),
            tool_calls: self
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> OpenAiClient {
        OpenAiClient::new("sk-test", "gpt-4o")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/")
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(client().endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_wire_format() {
        let messages = vec![
            Message::user("list files"),
            Message::assistant_with_tools("", vec![ToolCall::new("call_1", "bash", r#"{"command":"ls"}"#)]),
            Message::tool("a.txt", "call_1", "bash"),
        ];
        let tools = vec![json!({"type": "function", "function": {"name": "bash"}})];

        let request = client().build_request(&messages, Some("be brief"), &tools, Some(ToolChoice::Auto));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "be brief");
        assert_eq!(value["messages"][2]["tool_calls"][0]["type"], "function");
        assert_eq!(value["messages"][2]["tool_calls"][0]["function"]["arguments"], r#"{"command":"ls"}"#);
        assert_eq!(value["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(value["tool_choice"], "auto");
        assert_eq!(value["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_tool_choice_omitted_without_tools() {
        let request = client().build_request(&[Message::user("hi")], None, &[], Some(ToolChoice::Required));
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
    }

    #[test]
    fn test_response_parsing_and_usage() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "terminate", "arguments": "{\"status\":\"success\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 8}
        }))
        .unwrap();

        let client = client();
        client.record_usage(response.usage.as_ref().unwrap());
        client.record_usage(&Usage {
            prompt_tokens: 30,
            completion_tokens: 2,
        });
        assert_eq!(client.total_input_tokens(), 150);
        assert_eq!(client.total_completion_tokens(), 10);

        let message = response.choices.into_iter().next().unwrap().message;
        let parsed = message.into_response();
        assert_eq!(parsed.content, "");
        assert_eq!(parsed.tool_calls[0].name, "terminate");
        assert_eq!(parsed.tool_calls[0].parse_arguments().unwrap()["status"], "success");
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error":{"message":"Incorrect API key","code":"invalid_api_key"}}"#;
        assert!(matches!(
            parse_error_response(401, body),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            parse_error_response(502, "bad gateway"),
            ProviderError::ServerError(_)
        ));
    }

    #[test]
    fn test_from_settings_requires_api_key() {
        let settings = LlmSettings::default();
        assert!(OpenAiClient::from_settings(&settings).is_err());

        let settings = LlmSettings {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let client = OpenAiClient::from_settings(&settings).unwrap();
        assert_eq!(client.model(), settings.model);
    }
}
