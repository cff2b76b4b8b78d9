// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Named actions
//!
//! Stages never hold a handle to the host tooling. They ask an
//! [`ActionLookup`] for an action by name ("build:app", "integration-tests")
//! and invoke it. The lookup is rebuilt from a serializable
//! [`ActionCatalog`], which is what lets a resolved plan be cached and
//! replayed.

mod build;
mod catalog;
mod command;

pub use build::BuildAction;
pub use catalog::{
    build_action_name, ActionCatalog, ActionDefinition, ActionServices, CatalogLookup,
    BUILD_ACTION_PREFIX,
};
pub use command::CommandAction;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::ArtifactRef;
use crate::errors::{ShipflowError, ShipflowResult};

/// Input handed to an action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRequest {
    /// Extra environment variables for the action
    pub env: BTreeMap<String, String>,

    /// Build argument overrides (used by build actions)
    pub build_args: BTreeMap<String, String>,
}

impl ActionRequest {
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn with_build_args(mut self, args: BTreeMap<String, String>) -> Self {
        self.build_args.extend(args);
        self
    }
}

/// What an action reported back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Whether the action considers itself successful
    pub success: bool,

    /// Nothing had to be done
    pub up_to_date: bool,

    /// Exit code, for process-backed actions
    pub exit_code: Option<i32>,

    pub stdout: String,
    pub stderr: String,

    /// Artifact produced, for build actions
    pub artifact: Option<ArtifactRef>,

    pub duration: Duration,
}

impl ActionOutcome {
    /// A successful outcome with no output
    pub fn succeeded() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            ..Default::default()
        }
    }

    /// A failed outcome
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn with_artifact(mut self, artifact: ArtifactRef) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Short failure description for errors and logs
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        match (self.exit_code, stderr.is_empty()) {
            (Some(code), true) => format!("exited with status {code}"),
            (Some(code), false) => format!("exited with status {code}: {}", last_line(stderr)),
            (None, true) => "reported failure".to_string(),
            (None, false) => last_line(stderr).to_string(),
        }
    }
}

fn last_line(text: &str) -> &str {
    text.lines().last().unwrap_or(text)
}

/// A named unit of work the pipeline can invoke
#[async_trait]
pub trait Action: Send + Sync {
    /// Name the action is registered under
    fn name(&self) -> &str;

    /// Execute the action
    ///
    /// A failed outcome is `Ok` with `success == false`. `Err` is reserved for
    /// the action being unable to run at all.
    async fn run(&self, request: &ActionRequest) -> ShipflowResult<ActionOutcome>;
}

/// Resolves and invokes named actions
#[async_trait]
pub trait ActionLookup: Send + Sync {
    /// Find an action by name
    fn find(&self, name: &str) -> Option<Arc<dyn Action>>;

    /// Invoke a previously resolved action
    async fn invoke(
        &self,
        action: &dyn Action,
        request: &ActionRequest,
    ) -> ShipflowResult<ActionOutcome> {
        action.run(request).await
    }

    /// Find an action, failing with [`ShipflowError::ActionNotFound`]
    fn require(&self, name: &str, context: &str) -> ShipflowResult<Arc<dyn Action>> {
        self.find(name).ok_or_else(|| ShipflowError::ActionNotFound {
            name: name.to_string(),
            context: context.to_string(),
        })
    }
}
