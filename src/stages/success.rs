// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Success path: tag, archive, publish
//!
//! Any failure aborts the rest of the path and propagates.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::{artifact_env, require_artifact, resolve_path, HookRunner, PUBLISHED_REFS_KEY};
use crate::actions::ActionLookup;
use crate::backend::{ImageBackend, ImageRef};
use crate::errors::{ShipflowError, ShipflowResult};
use crate::pipeline::{PipelineContext, PublishStep, RegistrySpec, SuccessStep};

pub struct SuccessPathExecutor {
    backend: Arc<dyn ImageBackend>,
    hooks: HookRunner,
    registries: BTreeMap<String, RegistrySpec>,
    base_dir: Option<PathBuf>,
}

impl SuccessPathExecutor {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        lookup: Arc<dyn ActionLookup>,
        registries: BTreeMap<String, RegistrySpec>,
    ) -> Self {
        Self {
            backend,
            hooks: HookRunner::new(lookup),
            registries,
            base_dir: None,
        }
    }

    /// Directory relative archive paths are resolved against
    pub fn with_base_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base_dir = dir;
        self
    }

    pub async fn execute(
        &self,
        step: &SuccessStep,
        context: &PipelineContext,
    ) -> ShipflowResult<PipelineContext> {
        let source = require_artifact(context, "success")?.image.clone();
        let mut next = context.advanced();

        if !step.tags.is_empty() {
            let targets: Vec<ImageRef> = step.tags.iter().map(|tag| source.with_tag(tag)).collect();
            info!(image = %source, tags = ?step.tags, "tagging");
            self.backend.tag(&source, &targets).await?;
            next = next.with_tags(step.tags.iter().cloned());
        }

        if let Some(ref archive) = step.archive {
            let path = resolve_path(self.base_dir.as_deref(), &archive.path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            info!(image = %source, path = %path.display(), "archiving");
            self.backend.save(&source, &path, archive.compression).await?;
            next = next.with_metadata("archive.path", path.display().to_string());
        }

        if let Some(ref publish) = step.publish {
            let published = self.publish(&source, publish).await?;
            if !published.is_empty() {
                next = next.with_metadata(PUBLISHED_REFS_KEY, published.join(","));
            }
        }

        self.hooks
            .run("success", step.post_hook.as_ref(), &artifact_env(&next))
            .await?;

        Ok(next)
    }

    /// Tag and push to every target; returns the pushed references
    async fn publish(&self, source: &ImageRef, publish: &PublishStep) -> ShipflowResult<Vec<String>> {
        let mut published = Vec::new();

        for target in &publish.targets {
            let registry =
                self.registries
                    .get(&target.registry)
                    .ok_or_else(|| ShipflowError::InvalidPipeline {
                        reason: format!("Registry '{}' is not declared", target.registry),
                        help: None,
                    })?;

            let refs: Vec<ImageRef> = publish
                .tags_for(target, &source.tag)
                .iter()
                .map(|tag| source.retarget(Some(&registry.host), registry.namespace.as_deref(), tag))
                .collect();

            // Credentials first, so a missing one leaves no registry tags behind.
            let auth = registry.resolve_auth(&target.registry)?;

            let to_tag: Vec<ImageRef> = refs.iter().filter(|r| *r != source).cloned().collect();
            if !to_tag.is_empty() {
                self.backend.tag(source, &to_tag).await?;
            }

            for reference in &refs {
                info!(registry = %target.registry, image = %reference, "pushing");
                self.backend.push(reference, auth.as_ref()).await?;
                published.push(reference.to_string());
            }
        }

        Ok(published)
    }
}
