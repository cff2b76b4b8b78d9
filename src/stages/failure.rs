// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Failure path: mark the artifact and keep diagnostics
//!
//! Nothing in here escalates. The failure being handled is the interesting
//! one, so every error is logged and the path carries on.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::{artifact_env, resolve_path, HookRunner};
use crate::actions::ActionLookup;
use crate::backend::{ImageBackend, ImageRef};
use crate::pipeline::{FailureStep, PipelineContext};

pub struct FailurePathExecutor {
    backend: Arc<dyn ImageBackend>,
    hooks: HookRunner,
    base_dir: Option<PathBuf>,
}

impl FailurePathExecutor {
    pub fn new(backend: Arc<dyn ImageBackend>, lookup: Arc<dyn ActionLookup>) -> Self {
        Self {
            backend,
            hooks: HookRunner::new(lookup),
            base_dir: None,
        }
    }

    /// Directory relative diagnostics paths are resolved against
    pub fn with_base_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base_dir = dir;
        self
    }

    /// Run the failure path; `logs` are the stack logs taken before teardown
    pub async fn execute(
        &self,
        step: &FailureStep,
        logs: Option<&str>,
        context: &PipelineContext,
    ) -> PipelineContext {
        let mut next = context.advanced();

        if !step.tags.is_empty() {
            match context.built_artifact() {
                Some(artifact) => {
                    let source = &artifact.image;
                    let targets: Vec<ImageRef> =
                        step.tags.iter().map(|tag| source.with_tag(tag)).collect();
                    info!(image = %source, tags = ?step.tags, "marking failed image");
                    match self.backend.tag(source, &targets).await {
                        Ok(()) => next = next.with_tags(step.tags.iter().cloned()),
                        Err(e) => warn!(error = %e, "could not apply failure tags"),
                    }
                }
                None => warn!("no built image to mark"),
            }
        }

        if let Some(ref diagnostics) = step.diagnostics {
            let path = resolve_path(self.base_dir.as_deref(), &diagnostics.path);
            match logs {
                Some(logs) => match write_logs(&path, logs).await {
                    Ok(()) => {
                        info!(path = %path.display(), "diagnostics written");
                        next = next.with_metadata("diagnostics.path", path.display().to_string());
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "could not write diagnostics"),
                },
                None => warn!("no stack logs were captured; skipping diagnostics"),
            }
        }

        self.hooks
            .run_logged("failure", step.post_hook.as_ref(), &artifact_env(&next))
            .await;

        next
    }
}

async fn write_logs(path: &std::path::Path, logs: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, logs).await
}
