// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Process runner
//!
//! Runs commands as child processes of the current process.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::errors::{ShipflowError, ShipflowResult};

/// Runs commands with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new process runner
    pub fn new() -> Self {
        Self
    }

    /// Check that `program` can be found on PATH
    pub fn check_available(program: &str) -> ShipflowResult<()> {
        which::which(program)
            .map(|_| ())
            .map_err(|_| ShipflowError::tool_not_found(program))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> ShipflowResult<CommandOutput> {
        let start = Instant::now();
        debug!(command = %spec.display(), "running command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        if let Some(ref dir) = spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| ShipflowError::CommandFailed {
            command: spec.display(),
            error: e.to_string(),
            help: Some(format!("'{}' may not be installed or on PATH", spec.program)),
        })?;

        if let Some(ref input) = spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                match stdin.write_all(input.as_bytes()).await {
                    Ok(()) => {}
                    // The child exited without reading; its status and stderr tell why.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                        debug!(command = %spec.display(), "child closed stdin early");
                    }
                    Err(e) => return Err(e.into()),
                }
                // Closing stdin lets tools reading to EOF proceed
                drop(stdin);
            }
        }

        // On timeout the child is dropped, which kills it.
        let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ShipflowError::CommandFailed {
                command: spec.display(),
                error: e.to_string(),
                help: None,
            })?,
            Err(_) => {
                return Err(ShipflowError::CommandTimeout {
                    command: spec.display(),
                    timeout_secs: spec.timeout.as_secs(),
                })
            }
        };

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        };

        debug!(
            command = %spec.display(),
            exit_code = result.exit_code,
            elapsed_ms = result.duration.as_millis() as u64,
            "command finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_execute_simple_command() {
        let runner = ProcessRunner::new();
        let output = runner
            .run(&CommandSpec::shell("sh", "echo hello"))
            .await
            .unwrap();

        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let runner = ProcessRunner::new();
        let output = runner
            .run(&CommandSpec::shell("sh", "echo oops >&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(output.exit_code, 3);
        assert!(output.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn test_child_ignoring_stdin_keeps_its_stderr() {
        let runner = ProcessRunner::new();
        // Larger than a pipe buffer, so the write outlives the child.
        let input = "x".repeat(1 << 20);
        let output = runner
            .run(&CommandSpec::shell("sh", "echo 'login denied' >&2; exit 1").stdin(input))
            .await
            .unwrap();

        assert_eq!(output.exit_code, 1);
        assert!(output.stderr.contains("login denied"));
    }

    #[tokio::test]
    async fn test_stdin_is_forwarded() {
        let runner = ProcessRunner::new();
        let output = runner
            .run(&CommandSpec::new("cat").stdin("secret"))
            .await
            .unwrap();

        assert_eq!(output.stdout, "secret");
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::shell("sh", "sleep 5").timeout(Duration::from_millis(100));

        match runner.run(&spec).await {
            Err(ShipflowError::CommandTimeout { .. }) => {}
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = ProcessRunner::new();
        let result = runner
            .run(&CommandSpec::new("shipflow-definitely-missing-binary"))
            .await;
        assert!(matches!(result, Err(ShipflowError::CommandFailed { .. })));
    }
}
