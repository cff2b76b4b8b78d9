// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Shell command actions

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{Action, ActionOutcome, ActionRequest};
use crate::errors::ShipflowResult;
use crate::process::{CommandRunner, CommandSpec};

/// Runs a shell command through the command runner
pub struct CommandAction {
    name: String,
    command: String,
    shell: String,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Duration,
    runner: Arc<dyn CommandRunner>,
}

impl CommandAction {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            shell: "sh".to_string(),
            working_dir: None,
            env: BTreeMap::new(),
            timeout: crate::process::DEFAULT_COMMAND_TIMEOUT,
            runner,
        }
    }

    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Action for CommandAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, request: &ActionRequest) -> ShipflowResult<ActionOutcome> {
        // request variables override the action's own
        let spec = CommandSpec::shell(&self.shell, &self.command)
            .current_dir(self.working_dir.clone())
            .envs(&self.env)
            .envs(&request.env)
            .timeout(self.timeout);

        debug!(action = %self.name, command = %self.command, "running command action");
        let output = self.runner.run(&spec).await?;

        Ok(ActionOutcome {
            success: output.success(),
            up_to_date: false,
            exit_code: Some(output.exit_code),
            stdout: output.stdout,
            stderr: output.stderr,
            artifact: None,
            duration: output.duration,
        })
    }
}
