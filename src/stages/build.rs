// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Build stage

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::{artifact_env, HookRunner};
use crate::actions::{ActionLookup, ActionRequest};
use crate::errors::{ShipflowError, ShipflowResult};
use crate::pipeline::{BuildStep, PipelineContext};

/// Runs the build action and records the artifact it produced
pub struct BuildStageExecutor {
    lookup: Arc<dyn ActionLookup>,
    hooks: HookRunner,
}

impl BuildStageExecutor {
    pub fn new(lookup: Arc<dyn ActionLookup>) -> Self {
        Self {
            hooks: HookRunner::new(Arc::clone(&lookup)),
            lookup,
        }
    }

    /// Build once; there are no retries
    pub async fn execute(
        &self,
        step: &BuildStep,
        context: &PipelineContext,
    ) -> ShipflowResult<PipelineContext> {
        self.hooks
            .run("build", step.pre_hook.as_ref(), &BTreeMap::new())
            .await?;

        let action_name = step.action_name();
        let action = self.lookup.require(&action_name, "build stage")?;
        info!(image = %step.image, action = %action_name, "building");

        let request = ActionRequest::default().with_build_args(step.build_args.clone());
        let failed = |message: String, help: Option<String>| ShipflowError::BuildFailed {
            image: step.image.clone(),
            message,
            help,
        };

        let outcome = match self.lookup.invoke(action.as_ref(), &request).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_configuration_error() => return Err(e),
            Err(ShipflowError::Backend { message, help, .. }) => return Err(failed(message, help)),
            Err(e) => return Err(failed(e.to_string(), None)),
        };

        if !outcome.success {
            return Err(failed(outcome.failure_message(), None));
        }

        let artifact = outcome.artifact.clone().ok_or_else(|| {
            failed(
                format!("action '{}' produced no image", action_name),
                Some("Use a build action, or an action that reports the image it built".into()),
            )
        })?;

        info!(
            image = %artifact.image,
            id = %artifact.id,
            up_to_date = outcome.up_to_date,
            "build finished"
        );

        let next = context
            .with_artifact(artifact)?
            .with_metadata("build.up_to_date", outcome.up_to_date.to_string());

        self.hooks
            .run("build", step.post_hook.as_ref(), &artifact_env(&next))
            .await?;

        Ok(next)
    }
}
