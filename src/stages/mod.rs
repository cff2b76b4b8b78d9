// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Stage executors
//!
//! Each executor takes a step and the current [`PipelineContext`] and hands
//! back a new context. None of them mutate their input, so the driver always
//! holds the last good context for cleanup.
//!
//! [`PipelineContext`]: crate::pipeline::PipelineContext

mod always;
mod build;
mod failure;
mod hooks;
mod router;
mod success;

pub use always::AlwaysStageExecutor;
pub use build::BuildStageExecutor;
pub use failure::FailurePathExecutor;
pub use hooks::HookRunner;
pub use router::{ConditionalPath, ConditionalRouter, Route};
pub use success::SuccessPathExecutor;
pub use test::{TestPhase, TestStageExecutor, TestStageOutput};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::backend::ArtifactRef;
use crate::errors::{ShipflowError, ShipflowResult};
use crate::pipeline::PipelineContext;

/// Metadata key listing references pushed to registries, comma separated
pub const PUBLISHED_REFS_KEY: &str = "publish.refs";

/// Resolve a relative path against the pipeline's base directory
pub(crate) fn resolve_path(base_dir: Option<&Path>, path: &Path) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

/// The built artifact, required by every stage after the build
pub(crate) fn require_artifact<'a>(
    context: &'a PipelineContext,
    stage: &str,
) -> ShipflowResult<&'a ArtifactRef> {
    context
        .built_artifact()
        .ok_or_else(|| ShipflowError::InvalidPipeline {
            reason: format!("The {} stage needs a built artifact", stage),
            help: None,
        })
}

/// Environment describing the artifact, handed to hooks
pub(crate) fn artifact_env(context: &PipelineContext) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    if let Some(artifact) = context.built_artifact() {
        env.insert("SHIPFLOW_IMAGE".to_string(), artifact.image.to_string());
        env.insert("SHIPFLOW_IMAGE_ID".to_string(), artifact.id.clone());
    }
    env
}
