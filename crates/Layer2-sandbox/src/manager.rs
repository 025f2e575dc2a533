//! Sandbox Manager - 샌드박스 생성/조회/삭제
//!
//! 에이전트는 `SandboxProvider`로만 샌드박스를 얻고 반납합니다.
//! 실제 구현은 Docker 데몬에 연결된 `SandboxManager`입니다.

use crate::docker::DockerSandbox;
use async_trait::async_trait;
use bollard::Docker;
use pilot_foundation::config::SandboxSettings;
use pilot_foundation::{Error, Result, Sandbox};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// 샌드박스 공급자
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// 샌드박스 생성 (같은 ID가 있으면 기존 것을 반환)
    async fn create(&self, id: &str) -> Result<Arc<dyn Sandbox>>;

    /// 샌드박스 삭제
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Docker 기반 샌드박스 관리자
#[derive(Clone)]
pub struct SandboxManager {
    docker: Docker,
    settings: Arc<SandboxSettings>,
    sandboxes: Arc<RwLock<HashMap<String, Arc<DockerSandbox>>>>,
}

impl SandboxManager {
    /// 로컬 Docker 데몬에 연결
    pub async fn connect(settings: SandboxSettings) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Sandbox(format!("Failed to connect to Docker: {}", e)))?;

        docker
            .ping()
            .await
            .map_err(|e| Error::Sandbox(format!("Docker is not available: {}", e)))?;

        info!(
            image = %settings.image,
            workspace_root = %settings.workspace_root.display(),
            "Connected to Docker"
        );

        Ok(Self {
            docker,
            settings: Arc::new(settings),
            sandboxes: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    pub async fn get(&self, id: &str) -> Option<Arc<DockerSandbox>> {
        self.sandboxes.read().await.get(id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.sandboxes.read().await.len()
    }

    /// 남아 있는 모든 샌드박스 삭제
    pub async fn delete_all(&self) {
        let drained: Vec<_> = self.sandboxes.write().await.drain().collect();
        for (id, sandbox) in drained {
            if let Err(e) = sandbox.remove().await {
                warn!(sandbox = %id, "Failed to remove sandbox: {}", e);
            }
        }
    }
}

#[async_trait]
impl SandboxProvider for SandboxManager {
    async fn create(&self, id: &str) -> Result<Arc<dyn Sandbox>> {
        let mut sandboxes = self.sandboxes.write().await;
        if let Some(existing) = sandboxes.get(id) {
            return Ok(existing.clone() as Arc<dyn Sandbox>);
        }

        let sandbox = Arc::new(DockerSandbox::create(self.docker.clone(), id, &self.settings).await?);
        sandboxes.insert(id.to_string(), sandbox.clone());
        Ok(sandbox)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.sandboxes.write().await.remove(id);
        match removed {
            Some(sandbox) => sandbox.remove().await,
            None => Ok(()),
        }
    }
}
