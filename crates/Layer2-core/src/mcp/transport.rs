//! MCP Transport - 전송 계층 구현
//!
//! MCP 서버와의 통신을 위한 전송 계층
//! - Stdio: 로컬 프로세스와 stdin/stdout 통신 (줄 단위 JSON)
//! - SSE: HTTP Server-Sent Events 수신 + POST 송신

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use pilot_foundation::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 기본 요청 타임아웃
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// JSON-RPC
// ============================================================================

/// JSON-RPC 2.0 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// 에러 응답이면 Err로 변환
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::Mcp(format!("{} (code {})", error.message, error.code))),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// JSON-RPC 에러
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC 알림 (응답 없음)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

// ============================================================================
// Transport trait
// ============================================================================

/// MCP Transport trait
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// 요청 전송 및 응답 수신
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value>;

    /// 알림 전송 (응답 없음)
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// 연결 종료
    async fn close(&self) -> Result<()>;

    /// 연결 상태 확인
    fn is_connected(&self) -> bool;
}

// ============================================================================
// 응답 대기열
// ============================================================================

/// 요청 ID별 응답 대기열
#[derive(Clone, Default)]
struct PendingRequests {
    inner: Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>,
}

impl PendingRequests {
    fn register(&self, id: u64) -> oneshot::Receiver<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(id, tx);
        rx
    }

    fn cancel(&self, id: u64) {
        self.inner.lock().remove(&id);
    }

    /// 수신한 메시지를 대기 중인 요청에 전달
    fn deliver(&self, raw: &str) {
        match serde_json::from_str::<JsonRpcResponse>(raw) {
            Ok(response) => {
                let Some(id) = response.id else {
                    debug!("Ignoring MCP message without id");
                    return;
                };
                if let Some(sender) = self.inner.lock().remove(&id) {
                    let _ = sender.send(response);
                }
            }
            Err(e) => debug!("Non-JSON-RPC line or parse error: {}", e),
        }
    }

    /// 응답 대기 (타임아웃 시 대기열에서 제거)
    async fn wait(
        &self,
        id: u64,
        method: &str,
        rx: oneshot::Receiver<JsonRpcResponse>,
        timeout: Duration,
    ) -> Result<Value> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(Error::McpConnection(format!(
                "connection closed while waiting for '{}'",
                method
            ))),
            Err(_) => {
                self.cancel(id);
                Err(Error::Timeout(format!("MCP request '{}'", method)))
            }
        }
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }
}

// ============================================================================
// Stdio
// ============================================================================

/// Stdio Transport - 프로세스 기반 통신
pub struct StdioTransport {
    /// 요청 ID 카운터
    request_id: AtomicU64,

    /// 자식 프로세스
    child: tokio::sync::Mutex<Option<Child>>,

    /// stdin writer
    stdin_tx: mpsc::Sender<String>,

    /// 대기 중인 요청들
    pending: PendingRequests,

    /// 연결 상태
    connected: Arc<AtomicBool>,

    /// 요청 타임아웃
    timeout: Duration,
}

impl StdioTransport {
    /// 프로세스 시작
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        info!("Spawning MCP process: {} {:?}", command, args);

        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::McpConnection(format!("Failed to spawn MCP process '{}': {}", command, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::McpConnection("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::McpConnection("Failed to capture stdout".to_string()))?;
        let stderr = child.stderr.take();

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(32);
        let pending = PendingRequests::default();
        let connected = Arc::new(AtomicBool::new(true));

        // stdin writer task
        let connected_for_writer = Arc::clone(&connected);
        tokio::spawn(async move {
            while let Some(msg) = stdin_rx.recv().await {
                if let Err(e) = write_line(&mut stdin, &msg).await {
                    error!("Failed to write to MCP stdin: {}", e);
                    connected_for_writer.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        // stdout reader task
        let pending_for_reader = pending.clone();
        let connected_for_reader = Arc::clone(&connected);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("MCP stdout: {}", line);
                pending_for_reader.deliver(&line);
            }
            connected_for_reader.store(false, Ordering::SeqCst);
            // 대기 중인 요청은 채널이 닫히면서 즉시 실패
            pending_for_reader.clear();
            debug!("MCP stdout reader finished");
        });

        // stderr는 로그로만 흘려보냄
        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("MCP stderr: {}", line);
                }
            });
        }

        Ok(Self {
            request_id: AtomicU64::new(1),
            child: tokio::sync::Mutex::new(Some(child)),
            stdin_tx,
            pending,
            connected,
            timeout,
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn send_line(&self, msg: String) -> Result<()> {
        self.stdin_tx
            .send(format!("{}\n", msg))
            .await
            .map_err(|e| Error::McpConnection(format!("Failed to send message: {}", e)))
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if !self.is_connected() {
            return Err(Error::McpConnection("MCP transport not connected".to_string()));
        }

        let id = self.next_id();
        let rx = self.pending.register(id);
        let msg = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        debug!("Sending MCP request: {}", msg);
        if let Err(e) = self.send_line(msg).await {
            self.pending.cancel(id);
            return Err(e);
        }

        self.pending.wait(id, method, rx, self.timeout).await
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::McpConnection("MCP transport not connected".to_string()));
        }

        let msg = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.send_line(msg).await
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.pending.clear();

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill MCP process: {}", e);
            }
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SSE
// ============================================================================

/// SSE Transport - HTTP Server-Sent Events 기반 통신
///
/// 서버는 첫 `endpoint` 이벤트로 메시지를 POST할 URL을 알려주고,
/// 이후 응답은 `message` 이벤트로 도착합니다.
pub struct SseTransport {
    request_id: AtomicU64,
    client: reqwest::Client,
    pending: PendingRequests,
    connected: Arc<AtomicBool>,
    message_url: reqwest::Url,
    listener: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl SseTransport {
    /// SSE 연결 생성 (endpoint 이벤트를 받을 때까지 대기)
    pub async fn connect(
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        info!("Connecting to MCP SSE server: {}", url);

        let base = reqwest::Url::parse(url)
            .map_err(|e| Error::InvalidRequest(format!("invalid MCP url '{}': {}", url, e)))?;

        let client = reqwest::Client::builder()
            .default_headers(header_map(headers)?)
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        let mut source = reqwest_eventsource::EventSource::new(client.get(base.clone()))
            .map_err(|e| Error::McpConnection(format!("Failed to open SSE stream: {}", e)))?;

        let pending = PendingRequests::default();
        let connected = Arc::new(AtomicBool::new(true));
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();

        let pending_for_sse = pending.clone();
        let connected_for_sse = Arc::clone(&connected);
        let listener = tokio::spawn(async move {
            use reqwest_eventsource::Event;

            let mut endpoint_tx = Some(endpoint_tx);
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => debug!("SSE connection opened"),
                    Ok(Event::Message(message)) if message.event == "endpoint" => {
                        if let Some(tx) = endpoint_tx.take() {
                            let _ = tx.send(message.data);
                        }
                    }
                    Ok(Event::Message(message)) => {
                        debug!("SSE message: {}", message.data);
                        pending_for_sse.deliver(&message.data);
                    }
                    Err(e) => {
                        error!("SSE error: {}", e);
                        break;
                    }
                }
            }
            source.close();
            connected_for_sse.store(false, Ordering::SeqCst);
            pending_for_sse.clear();
            info!("SSE connection closed");
        });

        let endpoint = match tokio::time::timeout(timeout, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                listener.abort();
                return Err(Error::McpConnection(
                    "SSE stream ended before endpoint event".to_string(),
                ));
            }
            Err(_) => {
                listener.abort();
                return Err(Error::Timeout("waiting for SSE endpoint event".to_string()));
            }
        };

        let message_url = base.join(endpoint.trim()).map_err(|e| {
            Error::McpConnection(format!("invalid endpoint '{}': {}", endpoint, e))
        })?;
        debug!("MCP SSE message endpoint: {}", message_url);

        Ok(Self {
            request_id: AtomicU64::new(1),
            client,
            pending,
            connected,
            message_url,
            listener: Mutex::new(Some(listener)),
            timeout,
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<()> {
        let response = self
            .client
            .post(self.message_url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Failed to send MCP message: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!("MCP server returned {}", response.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if !self.is_connected() {
            return Err(Error::McpConnection(
                "MCP SSE transport not connected".to_string(),
            ));
        }

        let id = self.next_id();
        let rx = self.pending.register(id);
        if let Err(e) = self.post(&JsonRpcRequest::new(id, method, params)).await {
            self.pending.cancel(id);
            return Err(e);
        }

        self.pending.wait(id, method, rx, self.timeout).await
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::McpConnection(
                "MCP SSE transport not connected".to_string(),
            ));
        }

        self.post(&JsonRpcNotification::new(method, params)).await
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.pending.clear();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn write_line(stdin: &mut ChildStdin, msg: &str) -> std::io::Result<()> {
    stdin.write_all(msg.as_bytes()).await?;
    stdin.flush().await
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| Error::InvalidRequest(format!("invalid header '{}': {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("invalid header value for '{}': {}", key, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}
