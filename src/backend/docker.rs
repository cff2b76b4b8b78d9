// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Docker CLI backend
//!
//! Implements [`ImageBackend`] by shelling out to the `docker` CLI (or any
//! CLI with the same surface, such as `podman`).

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{ArtifactRef, AuthConfig, BackendOperation, BuildRequest, Compression, ImageBackend, ImageRef};
use crate::errors::{ShipflowError, ShipflowResult};
use crate::process::{CommandOutput, CommandRunner, CommandSpec, DEFAULT_COMMAND_TIMEOUT};

/// Builds longer than this are treated as hung
const BUILD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Image backend driving the docker CLI
pub struct DockerCliBackend {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

impl DockerCliBackend {
    /// Create a backend using `program` (usually "docker")
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Bound for every non-build command
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.program).timeout(self.timeout)
    }

    /// Run a command, turning a non-zero exit into a backend error
    async fn run_checked(
        &self,
        operation: BackendOperation,
        spec: CommandSpec,
    ) -> ShipflowResult<CommandOutput> {
        let output = self.runner.run(&spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ShipflowError::backend(operation, &output.stderr))
        }
    }

    async fn login(
        &self,
        operation: BackendOperation,
        image: &ImageRef,
        auth: &AuthConfig,
    ) -> ShipflowResult<()> {
        let mut spec = self.command().arg("login");
        if let Some(server) = auth.server.as_ref().or(image.registry.as_ref()) {
            spec = spec.arg(server);
        }
        let spec = spec
            .args(["--username", auth.username.as_str(), "--password-stdin"])
            .stdin(auth.password.clone());

        debug!(username = %auth.username, image = %image, "logging in to registry");
        self.run_checked(operation, spec).await.map(|_| ())
    }
}

#[async_trait]
impl ImageBackend for DockerCliBackend {
    async fn build(&self, request: &BuildRequest) -> ShipflowResult<ArtifactRef> {
        let reference = request.image.to_string();
        let mut spec = self
            .command()
            .timeout(BUILD_TIMEOUT)
            .args(["build", "-t", reference.as_str()]);

        if let Some(ref dockerfile) = request.dockerfile {
            spec = spec.arg("-f").arg(dockerfile.to_string_lossy());
        }
        for (key, value) in &request.build_args {
            spec = spec.arg("--build-arg").arg(format!("{key}={value}"));
        }
        for (key, value) in &request.labels {
            spec = spec.arg("--label").arg(format!("{key}={value}"));
        }
        if let Some(ref target) = request.target {
            spec = spec.arg("--target").arg(target);
        }
        if request.pull {
            spec = spec.arg("--pull");
        }
        if request.no_cache {
            spec = spec.arg("--no-cache");
        }
        let spec = spec.arg(request.context.to_string_lossy());

        info!(image = %reference, "building image");
        self.run_checked(BackendOperation::Build, spec).await?;

        let inspect = self
            .command()
            .args(["image", "inspect", "--format", "{{.Id}}", reference.as_str()]);
        let output = self.run_checked(BackendOperation::Build, inspect).await?;

        Ok(ArtifactRef::new(output.stdout.trim(), request.image.clone()))
    }

    async fn tag(&self, source: &ImageRef, targets: &[ImageRef]) -> ShipflowResult<()> {
        // The CLI takes one target per invocation.
        let source = source.to_string();
        for target in targets {
            let target = target.to_string();
            debug!(source = %source, target = %target, "tagging image");
            let spec = self.command().args(["tag", source.as_str(), target.as_str()]);
            self.run_checked(BackendOperation::Tag, spec).await?;
        }
        Ok(())
    }

    async fn save(
        &self,
        image: &ImageRef,
        output: &Path,
        compression: Compression,
    ) -> ShipflowResult<()> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ShipflowError::FileWriteError {
                    path: parent.to_path_buf(),
                    error: e.to_string(),
                })?;
        }

        let reference = image.to_string();
        let path = output.to_string_lossy().to_string();

        let spec = match compression.program() {
            None => self.command().args(["save", "-o", path.as_str(), reference.as_str()]),
            // Positional parameters keep the reference and path unquoted-safe.
            Some(compressor) => CommandSpec::new("bash")
                .timeout(self.timeout)
                .arg("-c")
                .arg(format!(
                    "set -o pipefail; \"$0\" save \"$1\" | {compressor} -c > \"$2\""
                ))
                .args([self.program.as_str(), reference.as_str(), path.as_str()]),
        };

        info!(image = %reference, output = %path, ?compression, "saving image");
        self.run_checked(BackendOperation::Save, spec).await.map(|_| ())
    }

    async fn push(&self, image: &ImageRef, auth: Option<&AuthConfig>) -> ShipflowResult<()> {
        if let Some(auth) = auth {
            self.login(BackendOperation::Push, image, auth).await?;
        }

        let reference = image.to_string();
        info!(image = %reference, "pushing image");
        let spec = self.command().args(["push", reference.as_str()]);
        self.run_checked(BackendOperation::Push, spec).await.map(|_| ())
    }

    async fn pull(&self, image: &ImageRef, auth: Option<&AuthConfig>) -> ShipflowResult<()> {
        if let Some(auth) = auth {
            self.login(BackendOperation::Pull, image, auth).await?;
        }

        let reference = image.to_string();
        info!(image = %reference, "pulling image");
        let spec = self.command().args(["pull", reference.as_str()]);
        self.run_checked(BackendOperation::Pull, spec).await.map(|_| ())
    }

    async fn exists(&self, image: &ImageRef) -> ShipflowResult<bool> {
        let reference = image.to_string();
        let spec = self.command().args(["image", "inspect", reference.as_str()]);
        let output = self.runner.run(&spec).await?;
        Ok(output.success())
    }

    async fn remove(&self, image: &ImageRef) -> ShipflowResult<()> {
        let reference = image.to_string();
        let spec = self.command().args(["image", "rm", reference.as_str()]);
        let output = self.runner.run(&spec).await?;

        if output.success() || output.stderr.to_lowercase().contains("no such image") {
            Ok(())
        } else {
            Err(ShipflowError::backend(BackendOperation::Remove, &output.stderr))
        }
    }
}
