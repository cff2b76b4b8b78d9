// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Compose-backed environment
//!
//! Drives `docker compose` (or a compatible CLI) with the stack's project
//! name, compose files and env files on every invocation.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{
    parse_status_output, EnvironmentLifecycle, EnvironmentState, LogOptions, StackDescriptor,
};
use crate::errors::{ShipflowError, ShipflowResult};
use crate::process::{CommandRunner, CommandSpec, DEFAULT_COMMAND_TIMEOUT};

/// Environment manager backed by `docker compose`
pub struct ComposeEnvironment {
    runner: Arc<dyn CommandRunner>,
    program: String,
    subcommand: Vec<String>,
    timeout: Duration,
}

impl ComposeEnvironment {
    /// Use `<program> compose` (the compose v2 plugin)
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            subcommand: vec!["compose".to_string()],
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Use a standalone binary such as `docker-compose`
    pub fn standalone(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            subcommand: Vec::new(),
            ..Self::new(runner, program)
        }
    }

    /// Bound for each compose invocation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base command carrying the stack's identity
    fn command(&self, stack: &StackDescriptor) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.program)
            .timeout(self.timeout)
            .current_dir(stack.working_dir.clone())
            .args(self.subcommand.iter().cloned())
            .args(["-p", stack.project.as_str()]);

        for file in &stack.files {
            spec = spec.arg("-f").arg(file.to_string_lossy());
        }
        for env_file in &stack.env_files {
            spec = spec.arg("--env-file").arg(env_file.to_string_lossy());
        }
        spec
    }
}

#[async_trait]
impl EnvironmentLifecycle for ComposeEnvironment {
    async fn up(&self, stack: &StackDescriptor) -> ShipflowResult<EnvironmentState> {
        info!(project = %stack.project, "starting environment");

        let spec = self.command(stack).args(["up", "-d"]);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(ShipflowError::EnvironmentStartFailed {
                project: stack.project.clone(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        self.status(stack).await
    }

    async fn down(&self, stack: &StackDescriptor) -> ShipflowResult<()> {
        info!(project = %stack.project, "stopping environment");

        let mut spec = self.command(stack).args(["down", "--remove-orphans"]);
        if stack.remove_volumes {
            spec = spec.arg("-v");
        }

        let output = self.runner.run(&spec).await?;
        if output.success() {
            Ok(())
        } else {
            Err(ShipflowError::EnvironmentStopFailed {
                project: stack.project.clone(),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    async fn status(&self, stack: &StackDescriptor) -> ShipflowResult<EnvironmentState> {
        let spec = self.command(stack).args(["ps", "-a", "--format", "json"]);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(ShipflowError::StatusFailed {
                message: output.stderr.trim().to_string(),
            });
        }

        let state = parse_status_output(&stack.project, &output.stdout);
        if state.services.is_empty() && !output.stdout.trim().is_empty() {
            warn!(project = %stack.project, "status output contained no recognizable services");
        }
        Ok(state)
    }

    async fn capture_logs(
        &self,
        stack: &StackDescriptor,
        options: &LogOptions,
    ) -> ShipflowResult<String> {
        let mut spec = self.command(stack).args(["logs", "--no-color"]);
        if let Some(tail) = options.tail {
            spec = spec.arg("--tail").arg(tail.to_string());
        }
        let spec = spec.args(options.services.iter().cloned());

        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(ShipflowError::LogCaptureFailed {
                project: stack.project.clone(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        // compose interleaves stdout and stderr of the services
        let mut logs = output.stdout;
        if !output.stderr.trim().is_empty() {
            logs.push_str(&output.stderr);
        }
        Ok(logs)
    }
}
