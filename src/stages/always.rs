// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Cleanup run on every exit path
//!
//! Cleanup must never replace the pipeline's own outcome, so it only logs.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{artifact_env, HookRunner, PUBLISHED_REFS_KEY};
use crate::actions::ActionLookup;
use crate::backend::{ImageBackend, ImageRef};
use crate::environment::{EnvironmentLifecycle, StackDescriptor};
use crate::pipeline::{AlwaysStep, PipelineContext};

pub struct AlwaysStageExecutor {
    backend: Arc<dyn ImageBackend>,
    environment: Arc<dyn EnvironmentLifecycle>,
    hooks: HookRunner,
}

impl AlwaysStageExecutor {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        environment: Arc<dyn EnvironmentLifecycle>,
        lookup: Arc<dyn ActionLookup>,
    ) -> Self {
        Self {
            backend,
            environment,
            hooks: HookRunner::new(lookup),
        }
    }

    pub async fn execute(
        &self,
        step: &AlwaysStep,
        stack: Option<&StackDescriptor>,
        context: &PipelineContext,
    ) -> PipelineContext {
        let mut next = context.advanced();

        if step.remove_images {
            let images = images_to_remove(context);
            let mut removed = 0usize;
            for image in &images {
                match self.backend.remove(image).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(image = %image, error = %e, "could not remove image"),
                }
            }
            info!(removed, total = images.len(), "removed images");
            next = next.with_metadata("cleanup.removed_images", removed.to_string());
        }

        if step.teardown_stack {
            match stack {
                Some(stack) => {
                    if let Err(e) = self.environment.down(stack).await {
                        warn!(project = %stack.project, error = %e, "stack teardown failed");
                    }
                }
                None => debug!("no test stack to tear down"),
            }
        }

        self.hooks
            .run_logged("cleanup", step.hook.as_ref(), &artifact_env(&next))
            .await;

        next
    }
}

/// Every local reference the run created: tags and published refs first,
/// the built image last
fn images_to_remove(context: &PipelineContext) -> Vec<ImageRef> {
    let Some(artifact) = context.built_artifact() else {
        return Vec::new();
    };
    let source = &artifact.image;

    let mut images: Vec<ImageRef> = context
        .applied_tags()
        .iter()
        .map(|tag| source.with_tag(tag))
        .collect();

    if let Some(published) = context.metadata().get(PUBLISHED_REFS_KEY) {
        for reference in published.split(',').filter(|r| !r.is_empty()) {
            match ImageRef::parse(reference) {
                Ok(image) => images.push(image),
                Err(e) => warn!(reference, error = %e, "skipping unparseable reference"),
            }
        }
    }

    images.push(source.clone());

    let mut unique = Vec::with_capacity(images.len());
    for image in images {
        if !unique.contains(&image) {
            unique.push(image);
        }
    }
    if let Some(pos) = unique.iter().position(|image| image == source) {
        let primary = unique.remove(pos);
        unique.push(primary);
    }
    unique
}
