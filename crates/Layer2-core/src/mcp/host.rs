//! MCP Connection Host - 에이전트 하나가 쓰는 MCP 연결 묶음
//!
//! 연결마다 독립된 세션을 유지하고, 원격 도구를 `{client_id}-{tool}` 이름의
//! 로컬 도구로 노출합니다.
//!
//! ## 사용법
//!
//! ```ignore
//! use pilot_core::mcp::{McpConnectionHost, McpTransportConfig};
//!
//! let mut host = McpConnectionHost::new(sandbox.clone());
//! host.add("fs", McpTransportConfig::Stdio {
//!     command: "npx".into(),
//!     args: vec!["-y".into(), "mcp-server-filesystem".into(), "/workspace".into()],
//!     env: Default::default(),
//! }).await?;
//!
//! let tools = host.tools();
//! // ...
//! host.disconnect_all().await; // 추가한 역순으로 정리
//! ```

use super::remote_tool::McpRemoteTool;
use super::sandbox_command::to_sandbox_command;
use super::session::McpSession;
use super::transport::{McpTransport, SseTransport, StdioTransport, DEFAULT_REQUEST_TIMEOUT};
use super::types::{McpServerSpec, McpTransportConfig, TransportKind};
use async_trait::async_trait;
use pilot_foundation::{Error, Result, Sandbox, Tool};
use std::collections::HashSet;
use std::future::Future;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Connector - 전송 계층 생성
// ============================================================================

/// 전송 설정으로 실제 연결을 만드는 팩토리
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(&self, config: &McpTransportConfig) -> Result<Arc<dyn McpTransport>>;
}

/// 프로세스 실행 / HTTP 연결을 사용하는 기본 구현
pub struct DefaultConnector {
    timeout: Duration,
}

impl DefaultConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for DefaultConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl McpConnector for DefaultConnector {
    async fn connect(&self, config: &McpTransportConfig) -> Result<Arc<dyn McpTransport>> {
        match config {
            McpTransportConfig::Stdio { command, args, env } => Ok(Arc::new(
                StdioTransport::spawn(command, args, env, self.timeout).await?,
            )),
            McpTransportConfig::Sse { url, headers } => Ok(Arc::new(
                SseTransport::connect(url, headers, self.timeout).await?,
            )),
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// 연결 하나
pub struct McpConnection {
    client_id: String,
    kind: TransportKind,
    session: Arc<McpSession>,
    tools: Vec<Arc<dyn Tool>>,
    /// 이 연결 전용으로 띄운 컨테이너 (정리 대상)
    container: Option<String>,
}

impl McpConnection {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn session(&self) -> &Arc<McpSession> {
        &self.session
    }

    /// 접두사가 붙은 도구 이름 목록
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    async fn shutdown(self) {
        if let Err(e) = self.session.close().await {
            warn!(client = %self.client_id, "Failed to close MCP session: {}", e);
        }
        if let Some(container) = &self.container {
            remove_container(container).await;
        }
        debug!(client = %self.client_id, "MCP connection closed");
    }
}

/// 컨테이너 제거 대기 한도
const CONTAINER_REMOVE_TIMEOUT: Duration = Duration::from_secs(10);

/// 전용 컨테이너 제거 (best-effort)
async fn remove_container(name: &str) {
    let command = tokio::process::Command::new("docker")
        .args(["rm", "-f", name])
        .kill_on_drop(true)
        .output();
    await_removal(name, CONTAINER_REMOVE_TIMEOUT, command).await;
}

/// 제거 명령 완료 대기. 한도를 넘기면 명령을 버리고 false
async fn await_removal<F>(name: &str, limit: Duration, command: F) -> bool
where
    F: Future<Output = std::io::Result<Output>>,
{
    match tokio::time::timeout(limit, command).await {
        Ok(Ok(output)) if output.status.success() => {
            debug!("Removed MCP container {}", name);
            true
        }
        Ok(Ok(output)) => {
            debug!(
                "docker rm -f {} exited with {}: {}",
                name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Ok(Err(e)) => {
            warn!("Failed to remove MCP container {}: {}", name, e);
            false
        }
        Err(_) => {
            warn!("Timed out removing MCP container {} after {:?}", name, limit);
            false
        }
    }
}

// ============================================================================
// Host
// ============================================================================

/// 에이전트 단위 MCP 연결 관리자
///
/// 연결은 추가된 순서대로 보관하고, 전체 정리는 항상 역순으로 합니다.
pub struct McpConnectionHost {
    sandbox: Arc<dyn Sandbox>,
    connector: Arc<dyn McpConnector>,
    connections: Vec<McpConnection>,
}

impl McpConnectionHost {
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self::with_connector(sandbox, Arc::new(DefaultConnector::default()))
    }

    pub fn with_connector(sandbox: Arc<dyn Sandbox>, connector: Arc<dyn McpConnector>) -> Self {
        Self {
            sandbox,
            connector,
            connections: Vec::new(),
        }
    }

    /// 요청의 서버 지정으로 연결 추가
    pub async fn add_spec(&mut self, spec: &McpServerSpec) -> Result<Vec<Arc<dyn Tool>>> {
        let config = spec.transport()?;
        self.add(&spec.id, config).await
    }

    /// 연결 추가
    ///
    /// 성공하면 새로 노출된 도구들을 돌려줍니다. 실패한 연결은 목록에 남지 않습니다.
    pub async fn add(
        &mut self,
        client_id: &str,
        config: McpTransportConfig,
    ) -> Result<Vec<Arc<dyn Tool>>> {
        if self.get(client_id).is_some() {
            return Err(Error::McpClientExists(client_id.to_string()));
        }

        let kind = config.kind();
        let (config, container) = self.scope_to_sandbox(client_id, config)?;

        let transport = self.connector.connect(&config).await.map_err(|e| match e {
            Error::McpConnection(_) => e,
            other => Error::McpConnection(format!(
                "Failed to connect MCP client '{}': {}",
                client_id, other
            )),
        });
        let transport = match transport {
            Ok(transport) => transport,
            Err(e) => {
                if let Some(container) = &container {
                    remove_container(container).await;
                }
                return Err(e);
            }
        };

        let session = match McpSession::establish(transport).await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                if let Some(container) = &container {
                    remove_container(container).await;
                }
                return Err(e);
            }
        };

        let tools: Vec<Arc<dyn Tool>> = session
            .tools()
            .iter()
            .map(|tool| {
                Arc::new(McpRemoteTool::new(client_id, tool, Arc::clone(&session)))
                    as Arc<dyn Tool>
            })
            .collect();

        // 접두사를 붙인 뒤에도 호스트 안에서 이름이 겹치면 안 됨 ("a" + "b-c" vs "a-b" + "c")
        if let Some(conflict) = self.conflicting_name(&tools) {
            warn!(client = %client_id, tool = %conflict, "MCP tool name conflict, dropping connection");
            if let Err(e) = session.close().await {
                warn!(client = %client_id, "Failed to close MCP session: {}", e);
            }
            if let Some(container) = &container {
                remove_container(container).await;
            }
            return Err(Error::InvalidRequest(format!(
                "MCP client '{}' exposes tool '{}' which conflicts with an existing tool",
                client_id, conflict
            )));
        }

        info!(
            client = %client_id,
            tool_count = tools.len(),
            "MCP client connected"
        );

        self.connections.push(McpConnection {
            client_id: client_id.to_string(),
            kind,
            session,
            tools: tools.clone(),
            container,
        });

        Ok(tools)
    }

    /// 이미 있는 이름이나 같은 묶음 안에서 중복되는 첫 도구 이름
    fn conflicting_name(&self, tools: &[Arc<dyn Tool>]) -> Option<String> {
        let mut seen: HashSet<String> = self
            .connections
            .iter()
            .flat_map(|c| c.tool_names())
            .collect();
        tools
            .iter()
            .map(|t| t.name().to_string())
            .find(|name| !seen.insert(name.clone()))
    }

    /// stdio 명령을 샌드박스 범위로 변환
    fn scope_to_sandbox(
        &self,
        client_id: &str,
        config: McpTransportConfig,
    ) -> Result<(McpTransportConfig, Option<String>)> {
        match config {
            McpTransportConfig::Stdio { command, args, env } => {
                let scoped = to_sandbox_command(
                    self.sandbox.id(),
                    self.sandbox.host_workspace(),
                    client_id,
                    &command,
                    &args,
                    &env,
                )?;
                let container = scoped
                    .dedicated_container
                    .then(|| scoped.container_name.clone());
                Ok((
                    McpTransportConfig::Stdio {
                        command: scoped.command,
                        args: scoped.args,
                        env: Default::default(),
                    },
                    container,
                ))
            }
            sse @ McpTransportConfig::Sse { .. } => Ok((sse, None)),
        }
    }

    /// 연결 하나 제거 (없으면 false)
    pub async fn remove(&mut self, client_id: &str) -> bool {
        let Some(position) = self
            .connections
            .iter()
            .position(|c| c.client_id == client_id)
        else {
            return false;
        };

        let connection = self.connections.remove(position);
        connection.shutdown().await;
        true
    }

    /// 모든 연결을 추가 역순으로 종료
    pub async fn disconnect_all(&mut self) {
        while let Some(connection) = self.connections.pop() {
            connection.shutdown().await;
        }
    }

    /// 에이전트 정리 시 호출
    pub async fn cleanup(&mut self) {
        if !self.connections.is_empty() {
            info!("Cleaning up {} MCP connection(s)", self.connections.len());
        }
        self.disconnect_all().await;
    }

    pub fn get(&self, client_id: &str) -> Option<&McpConnection> {
        self.connections.iter().find(|c| c.client_id == client_id)
    }

    /// 추가 순서대로 클라이언트 ID
    pub fn list_clients(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|c| c.client_id.clone())
            .collect()
    }

    pub fn client_count(&self) -> usize {
        self.connections.len()
    }

    /// 연결된 모든 원격 도구
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.connections
            .iter()
            .flat_map(|c| c.tools.iter().cloned())
            .collect()
    }
}
