//! # nightwatch_runner
//!
//! Sandbox execution layer for Nightwatch.
//!
//! Every reproduction and fix-verification run happens inside an ephemeral
//! Docker container bound to a per-pipeline workspace directory. This crate
//! owns that lifecycle: acquire the image, create a labeled session with
//! resource caps, exec commands with timeouts, and tear the session down on
//! every exit path.
//!
//! # Resource policy
//!
//! Each session gets a 512 MiB memory cap (swap pinned to the cap), roughly
//! half a CPU core, and bridge networking so dependency installation can
//! reach package indexes. The workspace is bind-mounted at `/app`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nightwatch_runner::{with_sandbox, ContainerRunner, DockerRunner, RunnerError, SandboxConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner: Arc<dyn ContainerRunner> = Arc::new(DockerRunner::new().await?);
//!     let config = SandboxConfig::new("python", "/tmp/my-workspace").tag("3.11-slim");
//!
//!     let outcome = with_sandbox::<_, RunnerError, _, _>(runner, &config, |sandbox| async move {
//!         sandbox
//!             .exec_args(&["python", "-m", "pytest"], Duration::from_secs(300))
//!             .await
//!     })
//!     .await?;
//!
//!     println!("Exit code: {}", outcome.exit_code);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod docker;
pub mod error;
pub mod mock;
pub mod runner;
pub mod session;

pub use config::{SandboxConfig, CONTAINER_WORKDIR, DEFAULT_CPU_CORES, DEFAULT_MEMORY_BYTES, WORKSPACE_LABEL};
pub use docker::DockerRunner;
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedExec, MockExec, MockRunner};
pub use runner::{ContainerRunner, ExecOutcome, SessionInfo, TIMEOUT_EXIT_CODE};
pub use session::{with_sandbox, SandboxHandle};
