//! Docker Sandbox - 에이전트 전용 컨테이너
//!
//! 컨테이너 하나를 `sleep infinity`로 띄워두고 명령은 exec로 실행합니다.
//! 호스트의 `{workspace_root}/{id}` 디렉토리를 컨테이너 `work_dir`에 마운트하므로
//! 워크스페이스 안의 파일은 호스트에서 직접 읽고 씁니다.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use pilot_foundation::config::SandboxSettings;
use pilot_foundation::{CommandOutput, Error, Result, Sandbox};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Docker 컨테이너 샌드박스
pub struct DockerSandbox {
    docker: Docker,
    id: String,
    container_id: String,
    work_dir: String,
    host_workspace: PathBuf,
    default_timeout: Duration,
}

impl DockerSandbox {
    /// 컨테이너 생성 및 시작
    pub async fn create(docker: Docker, id: &str, settings: &SandboxSettings) -> Result<Self> {
        let host_workspace = settings.workspace_root.join(id);
        tokio::fs::create_dir_all(&host_workspace).await.map_err(|e| {
            Error::Sandbox(format!(
                "Failed to create workspace {}: {}",
                host_workspace.display(),
                e
            ))
        })?;

        ensure_image(&docker, &settings.image).await?;

        let options = CreateContainerOptions {
            name: id.to_string(),
            ..Default::default()
        };
        let response = docker
            .create_container(Some(options), container_config(settings, &host_workspace))
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to create container: {}", e)))?;

        docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to start container: {}", e)))?;

        info!(sandbox = %id, image = %settings.image, "Sandbox container started");

        Ok(Self {
            docker,
            id: id.to_string(),
            container_id: response.id,
            work_dir: settings.work_dir.clone(),
            host_workspace,
            default_timeout: Duration::from_secs(settings.command_timeout_secs),
        })
    }

    /// 컨테이너 강제 제거
    pub async fn remove(&self) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(&self.container_id, Some(options))
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to remove container: {}", e)))?;
        info!(sandbox = %self.id, "Sandbox container removed");
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let exec_options = CreateExecOptions {
            cmd: Some(vec!["bash", "-c", command]),
            working_dir: Some(self.work_dir.as_str()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&self.container_id, exec_options)
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to create exec: {}", e)))?;

        let started = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to start exec: {}", e)))?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(Ok(msg)) = output.next().await {
                match msg {
                    LogOutput::StdOut { message } => stdout.push_str(&String::from_utf8_lossy(&message)),
                    LogOutput::StdErr { message } => stderr.push_str(&String::from_utf8_lossy(&message)),
                    _ => {}
                }
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to inspect exec: {}", e)))?;

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code: inspect.exit_code.unwrap_or(-1),
        })
    }

    fn host_path(&self, path: &str) -> Option<PathBuf> {
        host_path_for(&self.work_dir, &self.host_workspace, path)
    }
}

/// 이미지가 없으면 pull
async fn ensure_image(docker: &Docker, image: &str) -> Result<()> {
    if docker.inspect_image(image).await.is_ok() {
        return Ok(());
    }

    info!("Pulling sandbox image {}", image);
    let options = CreateImageOptions {
        from_image: image,
        ..Default::default()
    };
    let mut pull = docker.create_image(Some(options), None, None);
    while let Some(progress) = pull.next().await {
        let progress =
            progress.map_err(|e| Error::Sandbox(format!("Failed to pull image {}: {}", image, e)))?;
        if let Some(status) = progress.status {
            debug!("pull {}: {}", image, status);
        }
    }
    Ok(())
}

/// 샌드박스 컨테이너 설정
fn container_config(settings: &SandboxSettings, host_workspace: &Path) -> Config<String> {
    Config {
        image: Some(settings.image.clone()),
        working_dir: Some(settings.work_dir.clone()),
        host_config: Some(HostConfig {
            binds: Some(vec![format!(
                "{}:{}",
                host_workspace.display(),
                settings.work_dir
            )]),
            memory: settings
                .memory_limit_mb
                .map(|mb| (mb * 1024 * 1024) as i64),
            nano_cpus: settings.cpu_limit.map(|cpus| (cpus * 1e9) as i64),
            auto_remove: Some(false),
            ..Default::default()
        }),
        // exec로 명령을 넣을 수 있게 계속 실행
        cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
        ..Default::default()
    }
}

/// 컨테이너 경로를 마운트된 호스트 경로로 변환 (워크스페이스 밖이면 None)
pub fn host_path_for(work_dir: &str, host_workspace: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path).strip_prefix(work_dir).ok()?;
    if relative
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return None;
    }
    Some(host_workspace.join(relative))
}

#[async_trait]
impl Sandbox for DockerSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn work_dir(&self) -> &str {
        &self.work_dir
    }

    fn host_workspace(&self) -> &Path {
        &self.host_workspace
    }

    async fn run_command(&self, command: &str, limit: Option<Duration>) -> Result<CommandOutput> {
        let limit = limit.unwrap_or(self.default_timeout);
        debug!(sandbox = %self.id, "Running command: {}", command);

        match timeout(limit, self.exec(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "Command timed out after {} seconds",
                limit.as_secs()
            ))),
        }
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        if let Some(host_path) = self.host_path(path) {
            return tokio::fs::read_to_string(&host_path)
                .await
                .map_err(|e| Error::Sandbox(format!("Failed to read {}: {}", path, e)));
        }

        let quoted = shlex::try_quote(path)
            .map_err(|e| Error::InvalidRequest(format!("invalid path '{}': {}", path, e)))?;
        let output = self.exec(&format!("cat {}", quoted)).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(Error::Sandbox(output.combined()))
        }
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let host_path = self.host_path(path).ok_or_else(|| {
            Error::Sandbox(format!(
                "Cannot write {}: path is outside of {}",
                path, self.work_dir
            ))
        })?;

        if let Some(parent) = host_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&host_path, content)
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to write {}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_path_mapping() {
        let host = Path::new("/data/ws/pilot-sandbox-1");
        assert_eq!(
            host_path_for("/workspace", host, "/workspace/src/main.py"),
            Some(PathBuf::from("/data/ws/pilot-sandbox-1/src/main.py"))
        );
        assert_eq!(
            host_path_for("/workspace", host, "/workspace"),
            Some(PathBuf::from("/data/ws/pilot-sandbox-1"))
        );
        assert_eq!(host_path_for("/workspace", host, "/etc/hosts"), None);
        assert_eq!(host_path_for("/workspace", host, "/workspace/../etc"), None);
    }

    #[test]
    fn test_container_config_limits() {
        let settings = SandboxSettings {
            memory_limit_mb: Some(512),
            cpu_limit: Some(1.5),
            ..Default::default()
        };
        let config = container_config(&settings, Path::new("/data/ws/sb"));

        assert_eq!(config.image.as_deref(), Some("python:3.12-slim"));
        assert_eq!(config.working_dir.as_deref(), Some("/workspace"));
        let host = config.host_config.unwrap();
        assert_eq!(host.binds.unwrap(), vec!["/data/ws/sb:/workspace".to_string()]);
        assert_eq!(host.memory, Some(512 * 1024 * 1024));
        assert_eq!(host.nano_cpus, Some(1_500_000_000));
    }
}
