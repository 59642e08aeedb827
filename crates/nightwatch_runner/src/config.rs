//! Sandbox configuration types.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Container label used to bind a session to its workspace directory.
///
/// The janitor enumerates sessions by this label to find stale sandboxes.
pub const WORKSPACE_LABEL: &str = "nightwatch.workspace";

/// Default memory cap per sandbox session (512 MiB).
pub const DEFAULT_MEMORY_BYTES: i64 = 512 * 1024 * 1024;

/// Default CPU quota per sandbox session (half of one core).
pub const DEFAULT_CPU_CORES: f64 = 0.5;

/// In-container mount point for the workspace.
pub const CONTAINER_WORKDIR: &str = "/app";

/// Configuration for one sandbox session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Docker image to use
    pub image: String,
    /// Image tag
    pub tag: String,
    /// Host workspace directory bind-mounted at `workdir`
    pub workspace: PathBuf,
    /// Working directory inside the container
    pub workdir: String,
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Memory cap in bytes; swap is pinned to the same value
    pub memory_bytes: i64,
    /// CPU quota in cores
    pub cpu_cores: f64,
    /// Network mode; bridge is required for dependency installation
    pub network_mode: String,
    /// Container name prefix
    pub name_prefix: Option<String>,
}

impl SandboxConfig {
    pub fn new(image: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            tag: "latest".to_string(),
            workspace: workspace.into(),
            workdir: CONTAINER_WORKDIR.to_string(),
            env: HashMap::new(),
            memory_bytes: DEFAULT_MEMORY_BYTES,
            cpu_cores: DEFAULT_CPU_CORES,
            network_mode: "bridge".to_string(),
            name_prefix: None,
        }
    }

    /// Build from a full `image:tag` reference.
    pub fn from_image_ref(image_ref: &str, workspace: impl Into<PathBuf>) -> Self {
        match image_ref.rsplit_once(':') {
            Some((image, tag)) if !tag.contains('/') => {
                Self::new(image, workspace).tag(tag)
            }
            _ => Self::new(image_ref, workspace),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = dir.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn memory(mut self, bytes: i64) -> Self {
        self.memory_bytes = bytes;
        self
    }

    pub fn cpus(mut self, cores: f64) -> Self {
        self.cpu_cores = cores;
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Get the full image name with tag.
    pub fn full_image(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_sandbox_config_builder() {
        let config = SandboxConfig::new("python", "/tmp/ws")
            .tag("3.11-slim")
            .env("PYTHONUNBUFFERED", "1");

        assert_eq!(config.full_image(), "python:3.11-slim");
        assert_eq!(config.workdir, CONTAINER_WORKDIR);
        assert_eq!(config.workspace, Path::new("/tmp/ws"));
        assert_eq!(config.env.get("PYTHONUNBUFFERED"), Some(&"1".to_string()));
        assert_eq!(config.memory_bytes, DEFAULT_MEMORY_BYTES);
        assert_eq!(config.network_mode, "bridge");
    }

    #[test]
    fn test_from_image_ref() {
        let config = SandboxConfig::from_image_ref("python:3.11-slim", "/tmp/ws");
        assert_eq!(config.image, "python");
        assert_eq!(config.tag, "3.11-slim");

        let bare = SandboxConfig::from_image_ref("python", "/tmp/ws");
        assert_eq!(bare.image, "python");
        assert_eq!(bare.tag, "latest");
    }
}
