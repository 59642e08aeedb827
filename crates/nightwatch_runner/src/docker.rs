//! Docker implementation of ContainerRunner.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::service::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{SandboxConfig, WORKSPACE_LABEL};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{ContainerRunner, ExecOutcome, SessionInfo, TIMEOUT_EXIT_CODE};

/// Docker-based container runner.
pub struct DockerRunner {
    client: Docker,
}

impl DockerRunner {
    /// Create a new Docker runner.
    pub async fn new() -> RunnerResult<Self> {
        let client = Docker::connect_with_local_defaults()?;

        // Verify connection
        client.ping().await?;

        Ok(Self { client })
    }

    /// Create with custom Docker host.
    pub async fn with_host(host: &str) -> RunnerResult<Self> {
        let client = Docker::connect_with_http(host, 120, bollard::API_DEFAULT_VERSION)?;
        client.ping().await?;
        Ok(Self { client })
    }

    fn generate_container_name(prefix: Option<&str>) -> String {
        let id = Uuid::new_v4().to_string()[..8].to_string();
        match prefix {
            Some(p) => format!("{}-{}", p, id),
            None => format!("nightwatch-{}", id),
        }
    }
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    async fn is_available(&self) -> RunnerResult<bool> {
        match self.client.ping().await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    async fn pull_image(&self, image: &str, tag: &str) -> RunnerResult<()> {
        info!("Pulling image {}:{}", image, tag);

        let options = CreateImageOptions {
            from_image: image,
            tag,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(RunnerError::ImagePullFailed(e.to_string()));
                }
            }
        }

        info!("Image {}:{} pulled successfully", image, tag);
        Ok(())
    }

    async fn image_exists(&self, image: &str, tag: &str) -> RunnerResult<bool> {
        let full_image = format!("{}:{}", image, tag);
        match self.client.inspect_image(&full_image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_session(&self, config: &SandboxConfig) -> RunnerResult<String> {
        let full_image = config.full_image();
        let container_name = Self::generate_container_name(config.name_prefix.as_deref());

        debug!(
            "Creating session {} with image {} for workspace {}",
            container_name,
            full_image,
            config.workspace.display()
        );

        if !self.image_exists(&config.image, &config.tag).await? {
            self.pull_image(&config.image, &config.tag).await?;
        }

        let mounts = vec![Mount {
            target: Some(config.workdir.clone()),
            source: Some(config.workspace.to_string_lossy().to_string()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(false),
            ..Default::default()
        }];

        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        // Memory swap is pinned to the memory cap so sessions cannot swap
        // past their limit.
        let host_config = HostConfig {
            mounts: Some(mounts),
            memory: Some(config.memory_bytes),
            memory_swap: Some(config.memory_bytes),
            nano_cpus: Some((config.cpu_cores * 1_000_000_000.0) as i64),
            network_mode: Some(config.network_mode.clone()),
            ..Default::default()
        };

        let mut labels = HashMap::new();
        labels.insert(
            WORKSPACE_LABEL.to_string(),
            config.workspace.to_string_lossy().to_string(),
        );

        // Keep-alive command; actual work goes through exec.
        let container_config = Config {
            image: Some(full_image),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            working_dir: Some(config.workdir.clone()),
            env: Some(env),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: &container_name,
            platform: None,
        };

        let container = self
            .client
            .create_container(Some(create_options), container_config)
            .await?;

        self.client
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await?;

        Ok(container.id)
    }

    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        exec_timeout: Duration,
    ) -> RunnerResult<ExecOutcome> {
        debug!("Exec in {}: {:?}", container_id, argv);
        let started = Instant::now();

        let exec = self
            .client
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(argv.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        // The attached stream is multiplexed; bollard demultiplexes it into
        // StdOut/StdErr frames.
        let drain = async {
            match self.client.start_exec(&exec.id, None).await? {
                StartExecResults::Attached { mut output, .. } => {
                    while let Some(result) = output.next().await {
                        match result {
                            Ok(bollard::container::LogOutput::StdOut { message }) => {
                                stdout.push_str(&String::from_utf8_lossy(&message));
                            }
                            Ok(bollard::container::LogOutput::StdErr { message }) => {
                                stderr.push_str(&String::from_utf8_lossy(&message));
                            }
                            Ok(_) => {}
                            Err(e) => return Err(RunnerError::ExecFailed(e.to_string())),
                        }
                    }
                    Ok(())
                }
                StartExecResults::Detached => Ok(()),
            }
        };

        let timed_out = match timeout(exec_timeout, drain).await {
            Ok(result) => {
                result?;
                false
            }
            Err(_) => {
                warn!(
                    "Exec timed out after {:?} in {}, killing container",
                    exec_timeout, container_id
                );
                let _ = self
                    .client
                    .kill_container(container_id, Some(KillContainerOptions { signal: "SIGKILL" }))
                    .await;
                true
            }
        };

        let exit_code = if timed_out {
            TIMEOUT_EXIT_CODE
        } else {
            let inspect = self.client.inspect_exec(&exec.id).await?;
            inspect.exit_code.unwrap_or(-1)
        };

        Ok(ExecOutcome {
            exit_code,
            stdout,
            stderr,
            timed_out,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn remove_session(&self, container_id: &str) -> RunnerResult<()> {
        self.client
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn list_sessions(&self) -> RunnerResult<Vec<SessionInfo>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![WORKSPACE_LABEL.to_string()]);

        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self.client.list_containers(Some(options)).await?;

        let sessions = containers
            .into_iter()
            .filter_map(|c| {
                let container_id = c.id?;
                let workspace = c
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(WORKSPACE_LABEL))
                    .map(PathBuf::from);
                let created_at = c
                    .created
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                    .unwrap_or_else(Utc::now);
                Some(SessionInfo {
                    container_id,
                    workspace,
                    created_at,
                })
            })
            .collect();

        Ok(sessions)
    }
}
