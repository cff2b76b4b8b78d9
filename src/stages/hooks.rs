// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pre- and post-stage hooks
//!
//! A hook is just a named action. Build, test and success hooks abort their
//! stage when they fail; failure-path and cleanup hooks only log.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::actions::{ActionLookup, ActionRequest};
use crate::errors::{ShipflowError, ShipflowResult};

/// Runs hook actions through the action lookup
#[derive(Clone)]
pub struct HookRunner {
    lookup: Arc<dyn ActionLookup>,
}

impl HookRunner {
    pub fn new(lookup: Arc<dyn ActionLookup>) -> Self {
        Self { lookup }
    }

    /// Run `hook` if set, failing with [`ShipflowError::HookFailed`]
    pub async fn run(
        &self,
        stage: &str,
        hook: Option<&String>,
        env: &BTreeMap<String, String>,
    ) -> ShipflowResult<()> {
        let Some(name) = hook else {
            return Ok(());
        };

        let action = self.lookup.require(name, &format!("{} hook", stage))?;
        debug!(stage, hook = %name, "running hook");

        let request = ActionRequest::default().with_env(env.clone());
        let failed = |message: String| ShipflowError::HookFailed {
            stage: stage.to_string(),
            hook: name.clone(),
            message,
        };

        let outcome = self
            .lookup
            .invoke(action.as_ref(), &request)
            .await
            .map_err(|e| failed(e.to_string()))?;

        if outcome.success {
            Ok(())
        } else {
            Err(failed(outcome.failure_message()))
        }
    }

    /// Run `hook` if set; a failure is logged and otherwise ignored
    pub async fn run_logged(&self, stage: &str, hook: Option<&String>, env: &BTreeMap<String, String>) {
        if let Err(e) = self.run(stage, hook, env).await {
            warn!(stage, error = %e, "hook failed; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeLookup, Script};

    #[tokio::test]
    async fn test_absent_hook_is_a_no_op() {
        let lookup = Arc::new(FakeLookup::new());
        let hooks = HookRunner::new(lookup.clone());

        hooks.run("build", None, &BTreeMap::new()).await.unwrap();
        assert!(lookup.invoked().is_empty());
    }

    #[tokio::test]
    async fn test_hook_receives_env() {
        let lookup = Arc::new(FakeLookup::new().with("notify", Script::Succeed));
        let hooks = HookRunner::new(lookup.clone());

        let mut env = BTreeMap::new();
        env.insert("SHIPFLOW_IMAGE".to_string(), "app:ci".to_string());
        hooks
            .run("success", Some(&"notify".to_string()), &env)
            .await
            .unwrap();

        let request = lookup.last_request("notify").unwrap();
        assert_eq!(request.env["SHIPFLOW_IMAGE"], "app:ci");
    }

    #[tokio::test]
    async fn test_failing_hook() {
        let lookup = Arc::new(
            FakeLookup::new()
                .with("lint", Script::Fail(3))
                .with("broken", Script::Error("no shell".into())),
        );
        let hooks = HookRunner::new(lookup);

        let err = hooks
            .run("build", Some(&"lint".to_string()), &BTreeMap::new())
            .await
            .unwrap_err();
        match err {
            ShipflowError::HookFailed { stage, hook, message } => {
                assert_eq!(stage, "build");
                assert_eq!(hook, "lint");
                assert!(message.contains("status 3"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = hooks
            .run("build", Some(&"broken".to_string()), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ShipflowError::HookFailed { .. }));

        // Logged variant swallows both.
        hooks
            .run_logged("cleanup", Some(&"lint".to_string()), &BTreeMap::new())
            .await;
    }

    #[tokio::test]
    async fn test_unknown_hook() {
        let hooks = HookRunner::new(Arc::new(FakeLookup::new()));
        let err = hooks
            .run("test", Some(&"missing".to_string()), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ShipflowError::ActionNotFound { .. }));
    }
}
