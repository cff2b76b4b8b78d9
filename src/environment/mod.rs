// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Environment lifecycle management
//!
//! An environment is a named group of interdependent services described by
//! one or more compose files. The test stage brings it up, waits for its
//! services to become ready, and always tears it down again.

mod compose;
mod status;

pub use compose::ComposeEnvironment;
pub use status::parse_status_output;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{ShipflowError, ShipflowResult};

/// Describes a group of services started and stopped together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescriptor {
    /// Compose files, in override order
    pub files: Vec<PathBuf>,

    /// Project name; must be unique among concurrently running pipelines
    pub project: String,

    /// Environment files passed to compose
    #[serde(default)]
    pub env_files: Vec<PathBuf>,

    /// Directory compose runs in
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Remove named volumes on teardown
    #[serde(default)]
    pub remove_volumes: bool,
}

/// Normalized service status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Running,
    Healthy,
    Stopped,
    Restarting,
    Unknown,
}

impl ServiceStatus {
    /// Normalize a free-text status by substring match
    ///
    /// The tool's wording is not a stable contract, so matching is
    /// deliberately loose. "unhealthy" is checked first because it contains
    /// "healthy".
    pub fn from_status_text(text: &str) -> Self {
        let text = text.to_lowercase();

        if text.contains("unhealthy") {
            Self::Running
        } else if text.contains("healthy") {
            Self::Healthy
        } else if text.contains("running") || text.contains("up") {
            Self::Running
        } else if text.contains("exit") || text.contains("stop") {
            Self::Stopped
        } else if text.contains("restart") {
            Self::Restarting
        } else {
            Self::Unknown
        }
    }

    /// Whether a service in this status counts as `target`
    pub fn satisfies(self, target: ReadinessState) -> bool {
        match target {
            ReadinessState::Running => matches!(self, Self::Running | Self::Healthy),
            ReadinessState::Healthy => self == Self::Healthy,
        }
    }

    /// Ordering used when several containers back one service
    pub(crate) fn readiness_rank(self) -> u8 {
        match self {
            Self::Healthy => 4,
            Self::Running => 3,
            Self::Restarting => 2,
            Self::Unknown => 1,
            Self::Stopped => 0,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Healthy => write!(f, "HEALTHY"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Restarting => write!(f, "RESTARTING"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Target state for readiness polling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessState {
    #[default]
    Running,
    Healthy,
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Healthy => write!(f, "healthy"),
        }
    }
}

impl std::str::FromStr for ReadinessState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "healthy" => Ok(Self::Healthy),
            _ => Err(format!("Unknown readiness state: {}", s)),
        }
    }
}

/// A published port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: String,
}

/// One service of a running environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service key from the compose file
    pub service: String,
    /// Container identifier
    pub id: String,
    /// Container name
    pub name: String,
    pub status: ServiceStatus,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
}

/// Snapshot of an environment, rebuilt from scratch on every poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub project: String,
    pub services: BTreeMap<String, ServiceInfo>,
}

impl EnvironmentState {
    /// Services from `wanted` that do not satisfy `target` (missing ones included)
    pub fn unready(&self, wanted: &[String], target: ReadinessState) -> Vec<String> {
        wanted
            .iter()
            .filter(|name| {
                !self
                    .services
                    .get(name.as_str())
                    .is_some_and(|info| info.status.satisfies(target))
            })
            .cloned()
            .collect()
    }

    /// Host port published for a service's container port
    pub fn host_port(&self, service: &str, container_port: u16) -> Option<u16> {
        self.services
            .get(service)?
            .ports
            .iter()
            .find(|p| p.container_port == container_port)
            .map(|p| p.host_port)
    }

    /// Persist the snapshot as JSON so the test action can discover ports
    pub async fn write_to(&self, path: &Path) -> ShipflowResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ShipflowError::FileWriteError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })
    }
}

/// Options for log capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Restrict to these services (all when empty)
    pub services: Vec<String>,
    /// Only the last N lines per service
    pub tail: Option<usize>,
}

/// Starts, observes and stops a service group
#[async_trait]
pub trait EnvironmentLifecycle: Send + Sync {
    /// Start every service of the stack
    async fn up(&self, stack: &StackDescriptor) -> ShipflowResult<EnvironmentState>;

    /// Tear the stack down, including orphaned containers and networks
    ///
    /// Must tolerate a stack that only partially started.
    async fn down(&self, stack: &StackDescriptor) -> ShipflowResult<()>;

    /// Current status of every service
    async fn status(&self, stack: &StackDescriptor) -> ShipflowResult<EnvironmentState>;

    /// Logs of the stack, or a subset of its services
    async fn capture_logs(&self, stack: &StackDescriptor, options: &LogOptions)
        -> ShipflowResult<String>;

    /// Poll until every service satisfies `target` or `timeout` elapses
    ///
    /// Blocks the caller; the timeout is the only way to stop it early. A
    /// failed status read is logged and polling carries on.
    async fn wait_for(
        &self,
        stack: &StackDescriptor,
        services: &[String],
        target: ReadinessState,
        timeout: Duration,
        poll_interval: Duration,
    ) -> ShipflowResult<EnvironmentState> {
        let start = tokio::time::Instant::now();
        let deadline = start + timeout;
        let poll_interval = poll_interval.max(Duration::from_millis(1));

        loop {
            // A failed status read counts as nothing ready yet.
            let unready = match self.status(stack).await {
                Ok(state) => {
                    let unready = state.unready(services, target);
                    if unready.is_empty() {
                        info!(
                            project = %stack.project,
                            state = %target,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "services ready"
                        );
                        return Ok(state);
                    }
                    unready
                }
                Err(e) => {
                    warn!(project = %stack.project, error = %e, "status poll failed");
                    services.to_vec()
                }
            };

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(ShipflowError::ServiceTimeout {
                    project: stack.project.clone(),
                    target: target.to_string(),
                    services: unready,
                    timeout_secs: timeout.as_secs(),
                });
            }

            debug!(project = %stack.project, unready = ?unready, "waiting for services");
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, status: ServiceStatus) -> ServiceInfo {
        ServiceInfo {
            service: name.into(),
            id: format!("{name}-id"),
            name: format!("proj-{name}-1"),
            status,
            ports: vec![PortMapping {
                container_port: 5432,
                host_port: 49153,
                protocol: "tcp".into(),
            }],
        }
    }

    #[test]
    fn test_status_normalization() {
        use ServiceStatus::*;

        assert_eq!(ServiceStatus::from_status_text("running Up 2 minutes (healthy)"), Healthy);
        assert_eq!(ServiceStatus::from_status_text("Up 5 seconds (health: starting)"), Running);
        assert_eq!(ServiceStatus::from_status_text("Up 1 minute (unhealthy)"), Running);
        assert_eq!(ServiceStatus::from_status_text("running"), Running);
        assert_eq!(ServiceStatus::from_status_text("Exited (1) 3 seconds ago"), Stopped);
        assert_eq!(ServiceStatus::from_status_text("stopped"), Stopped);
        assert_eq!(ServiceStatus::from_status_text("Restarting (1) 2 seconds ago"), Restarting);
        assert_eq!(ServiceStatus::from_status_text("created"), Unknown);
    }

    #[test]
    fn test_satisfies() {
        assert!(ServiceStatus::Healthy.satisfies(ReadinessState::Running));
        assert!(ServiceStatus::Running.satisfies(ReadinessState::Running));
        assert!(!ServiceStatus::Running.satisfies(ReadinessState::Healthy));
        assert!(!ServiceStatus::Restarting.satisfies(ReadinessState::Running));
    }

    #[test]
    fn test_unready_includes_missing_services() {
        let mut state = EnvironmentState {
            project: "p".into(),
            services: BTreeMap::new(),
        };
        state.services.insert("db".into(), service("db", ServiceStatus::Running));

        let wanted = vec!["db".to_string(), "web".to_string()];
        assert_eq!(state.unready(&wanted, ReadinessState::Running), vec!["web"]);
        assert_eq!(
            state.unready(&wanted, ReadinessState::Healthy),
            vec!["db", "web"]
        );
        assert_eq!(state.host_port("db", 5432), Some(49153));
        assert_eq!(state.host_port("db", 80), None);
    }

    #[tokio::test]
    async fn test_write_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/stack.json");

        let mut state = EnvironmentState {
            project: "p".into(),
            services: BTreeMap::new(),
        };
        state.services.insert("db".into(), service("db", ServiceStatus::Healthy));
        state.write_to(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: EnvironmentState = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, state);
        assert!(raw.contains("HEALTHY"));
    }
}
