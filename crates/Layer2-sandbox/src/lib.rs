//! # pilot-sandbox
//!
//! 에이전트별 격리 실행 환경 (Docker 컨테이너)
//!
//! ## 사용법
//!
//! ```ignore
//! use pilot_sandbox::{SandboxManager, SandboxProvider};
//!
//! let manager = SandboxManager::connect(config.sandbox.clone()).await?;
//! let sandbox = manager.create("pilot-sandbox-task-1").await?;
//!
//! let output = sandbox.run_command("python --version", None).await?;
//! sandbox.write_file("/workspace/notes.md", "# notes").await?;
//!
//! manager.delete("pilot-sandbox-task-1").await?;
//! ```

mod docker;
mod manager;

pub use docker::{host_path_for, DockerSandbox};
pub use manager::{SandboxManager, SandboxProvider};
