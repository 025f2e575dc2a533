//! Sandbox Command - stdio MCP 서버 명령을 샌드박스 안에서 실행하도록 변환
//!
//! - `docker ...` 명령: 공유 워크스페이스를 마운트한 새 컨테이너로 실행
//! - `uvx` / `npx` / `deno` 명령: 기존 샌드박스 컨테이너에 `docker exec`

use pilot_foundation::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// 컨테이너 안의 워크스페이스 마운트 경로
pub const CONTAINER_WORKSPACE: &str = "/workspace";

/// 지원하는 명령 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Uvx,
    Npx,
    Deno,
    Docker,
}

impl CommandKind {
    /// 명령 이름으로 종류 판별
    pub fn detect(command: &str) -> Result<Self> {
        let command = command.trim();
        if command.starts_with("uvx") {
            Ok(CommandKind::Uvx)
        } else if command.starts_with("npx") {
            Ok(CommandKind::Npx)
        } else if command.starts_with("deno") {
            Ok(CommandKind::Deno)
        } else if command.starts_with("docker") {
            Ok(CommandKind::Docker)
        } else {
            Err(Error::InvalidRequest(format!(
                "Unsupported command type: {}",
                command
            )))
        }
    }
}

/// 호스트에서 실제로 실행할 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxCommand {
    pub command: String,
    pub args: Vec<String>,
    /// 이 연결이 사용하는 컨테이너 이름
    pub container_name: String,
    /// 연결 전용 컨테이너를 새로 띄우는지 여부
    pub dedicated_container: bool,
}

/// stdio 서버 명령을 샌드박스 범위의 명령으로 변환
pub fn to_sandbox_command(
    sandbox_id: &str,
    host_workspace: &Path,
    client_id: &str,
    command: &str,
    args: &[String],
    env: &BTreeMap<String, String>,
) -> Result<SandboxCommand> {
    match CommandKind::detect(command)? {
        CommandKind::Docker => Ok(docker_run(sandbox_id, host_workspace, client_id, args, env)),
        _ => docker_exec(sandbox_id, command, args, env),
    }
}

fn docker_run(
    sandbox_id: &str,
    host_workspace: &Path,
    client_id: &str,
    args: &[String],
    env: &BTreeMap<String, String>,
) -> SandboxCommand {
    let container_name = format!("{}-{}", sandbox_id, client_id);

    // 사용자가 `docker run ...`으로 준 경우 run은 한 번만
    let user_args: &[String] = match args.first() {
        Some(first) if first == "run" => &args[1..],
        _ => args,
    };

    let mut docker_args = vec!["run".to_string()];
    if !user_args.iter().any(|a| a == "--rm") {
        docker_args.push("--rm".to_string());
    }
    if !user_args.iter().any(|a| a == "-i") {
        docker_args.push("-i".to_string());
    }
    docker_args.push("-v".to_string());
    docker_args.push(format!("{}:{}", host_workspace.display(), CONTAINER_WORKSPACE));
    docker_args.push(format!("--name={}", container_name));
    for (key, value) in env {
        docker_args.push("-e".to_string());
        docker_args.push(format!("{}={}", key, value));
    }
    docker_args.extend(user_args.iter().cloned());

    SandboxCommand {
        command: "docker".to_string(),
        args: docker_args,
        container_name,
        dedicated_container: true,
    }
}

fn docker_exec(
    sandbox_id: &str,
    command: &str,
    args: &[String],
    env: &BTreeMap<String, String>,
) -> Result<SandboxCommand> {
    let mut docker_args = vec!["exec".to_string()];
    for (key, value) in env {
        docker_args.push("-e".to_string());
        docker_args.push(format!("{}={}", key, value));
    }
    docker_args.push("-i".to_string());
    docker_args.push(sandbox_id.to_string());

    let script = shlex::try_join(
        std::iter::once(command.trim()).chain(args.iter().map(String::as_str)),
    )
    .map_err(|e| Error::InvalidRequest(format!("invalid MCP command arguments: {}", e)))?;

    docker_args.push("bash".to_string());
    docker_args.push("-c".to_string());
    docker_args.push(script);

    Ok(SandboxCommand {
        command: "docker".to_string(),
        args: docker_args,
        container_name: sandbox_id.to_string(),
        dedicated_container: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_command_kind() {
        assert_eq!(CommandKind::detect("npx").unwrap(), CommandKind::Npx);
        assert_eq!(CommandKind::detect("uvx").unwrap(), CommandKind::Uvx);
        assert_eq!(CommandKind::detect("deno").unwrap(), CommandKind::Deno);
        assert_eq!(CommandKind::detect("docker").unwrap(), CommandKind::Docker);

        let err = CommandKind::detect("python").unwrap_err();
        assert!(err.to_string().contains("Unsupported command type"));
    }

    #[test]
    fn test_exec_into_sandbox_with_env() {
        let mut env = BTreeMap::new();
        env.insert("API_KEY".to_string(), "secret".to_string());
        env.insert("DEBUG".to_string(), "1".to_string());

        let cmd = to_sandbox_command(
            "pilot-sandbox-t1",
            Path::new("/srv/ws"),
            "fs",
            "npx",
            &strings(&["-y", "mcp-server-filesystem", "/workspace"]),
            &env,
        )
        .unwrap();

        assert_eq!(cmd.command, "docker");
        assert_eq!(
            cmd.args,
            strings(&[
                "exec",
                "-e",
                "API_KEY=secret",
                "-e",
                "DEBUG=1",
                "-i",
                "pilot-sandbox-t1",
                "bash",
                "-c",
                "npx -y mcp-server-filesystem /workspace",
            ])
        );
        assert_eq!(cmd.container_name, "pilot-sandbox-t1");
        assert!(!cmd.dedicated_container);
    }

    #[test]
    fn test_docker_runs_fresh_container() {
        let cmd = to_sandbox_command(
            "pilot-sandbox-t1",
            Path::new("/srv/ws"),
            "github",
            "docker",
            &strings(&["run", "-i", "--rm", "ghcr.io/github/github-mcp-server"]),
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(
            cmd.args,
            strings(&[
                "run",
                "-v",
                "/srv/ws:/workspace",
                "--name=pilot-sandbox-t1-github",
                "-i",
                "--rm",
                "ghcr.io/github/github-mcp-server",
            ])
        );
        assert_eq!(cmd.container_name, "pilot-sandbox-t1-github");
        assert!(cmd.dedicated_container);
    }

    #[test]
    fn test_docker_adds_missing_flags() {
        let cmd = to_sandbox_command(
            "sb",
            Path::new("/ws"),
            "c",
            "docker",
            &strings(&["mcp/time"]),
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(
            cmd.args,
            strings(&["run", "--rm", "-i", "-v", "/ws:/workspace", "--name=sb-c", "mcp/time"])
        );
    }

    #[test]
    fn test_unsupported_command_rejected() {
        let err = to_sandbox_command("sb", Path::new("/ws"), "c", "python", &[], &BTreeMap::new())
            .unwrap_err();
        assert!(err.is_client_error());
    }
}
