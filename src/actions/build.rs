// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Image build actions

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::{Action, ActionOutcome, ActionRequest};
use crate::backend::{ArtifactRef, BuildRequest, ImageBackend};
use crate::errors::ShipflowResult;
use crate::pipeline::ImageSpec;

/// Builds a declared image through the image backend
pub struct BuildAction {
    name: String,
    image: ImageSpec,
    backend: Arc<dyn ImageBackend>,
}

impl BuildAction {
    pub fn new(name: impl Into<String>, image: ImageSpec, backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            name: name.into(),
            image,
            backend,
        }
    }

    fn request(&self, overrides: &ActionRequest) -> ShipflowResult<BuildRequest> {
        let mut request = BuildRequest::new(self.image.image_ref()?, self.image.context.clone());
        request.dockerfile = self.image.dockerfile.clone();
        request.build_args = self.image.build_args.clone();
        request.build_args.extend(overrides.build_args.clone());
        request.labels = self.image.labels.clone();
        request.target = self.image.target.clone();
        request.pull = self.image.pull;
        request.no_cache = self.image.no_cache;
        Ok(request)
    }
}

#[async_trait]
impl Action for BuildAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, request: &ActionRequest) -> ShipflowResult<ActionOutcome> {
        let start = Instant::now();
        let build = self.request(request)?;

        if self.image.skip_if_exists && self.backend.exists(&build.image).await? {
            info!(image = %build.image, "image already present, skipping build");
            let artifact = ArtifactRef::new(build.image.to_string(), build.image.clone());
            return Ok(ActionOutcome {
                up_to_date: true,
                duration: start.elapsed(),
                ..ActionOutcome::succeeded().with_artifact(artifact)
            });
        }

        let artifact = self.backend.build(&build).await?;
        Ok(ActionOutcome {
            duration: start.elapsed(),
            ..ActionOutcome::succeeded().with_artifact(artifact)
        })
    }
}
