// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline driver
//!
//! Validates a plan, then runs build, test and the conditional paths in
//! order. Once validation has passed, cleanup runs on every exit path, and it
//! runs from exactly one place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::actions::ActionLookup;
use crate::backend::ImageBackend;
use crate::environment::{EnvironmentLifecycle, LogOptions};
use crate::errors::{ShipflowError, ShipflowResult};
use crate::pipeline::{PipelineContext, PipelinePlan, PipelineValidator};
use crate::stages::{
    AlwaysStageExecutor, BuildStageExecutor, ConditionalRouter, FailurePathExecutor, Route,
    SuccessPathExecutor, TestStageExecutor,
};

/// Result of a pipeline run that got past validation
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub pipeline: String,
    /// Final context, after cleanup
    pub context: PipelineContext,
    /// Path taken; `None` when there was no test stage
    pub route: Option<Route>,
    /// Validation warnings
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl PipelineOutcome {
    /// Whether the tests passed; `None` when they did not run
    pub fn tests_passed(&self) -> Option<bool> {
        self.context.test_result().map(|r| r.success)
    }
}

/// Runs one resolved plan against live collaborators
pub struct PipelineDriver {
    plan: PipelinePlan,
    lookup: Arc<dyn ActionLookup>,
    backend: Arc<dyn ImageBackend>,
    environment: Arc<dyn EnvironmentLifecycle>,
    base_dir: Option<PathBuf>,
}

impl PipelineDriver {
    pub fn new(
        plan: PipelinePlan,
        lookup: Arc<dyn ActionLookup>,
        backend: Arc<dyn ImageBackend>,
        environment: Arc<dyn EnvironmentLifecycle>,
    ) -> Self {
        Self {
            plan,
            lookup,
            backend,
            environment,
            base_dir: None,
        }
    }

    /// Directory relative paths in the pipeline are resolved against
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    /// Check the plan and that every action it names can be resolved
    pub fn validate(&self) -> ShipflowResult<Vec<String>> {
        let warnings = PipelineValidator::validate_plan(&self.plan).into_result()?;
        for (name, context) in self.plan.pipeline.referenced_actions() {
            self.lookup.require(&name, context)?;
        }
        Ok(warnings)
    }

    pub async fn run(&self) -> ShipflowResult<PipelineOutcome> {
        let start = Instant::now();
        let pipeline = &self.plan.pipeline;

        let warnings = self.validate()?;
        for warning in &warnings {
            warn!(pipeline = %pipeline.name, "{}", warning);
        }
        info!(pipeline = %pipeline.name, "starting pipeline");

        let mut context = PipelineContext::new();
        let body = self.run_stages(&mut context).await;
        if let Err(ref e) = body {
            warn!(pipeline = %pipeline.name, error = %e, "pipeline failed; running cleanup");
        }

        match pipeline.always {
            Some(ref always) => {
                context = self
                    .always_executor()
                    .execute(always, self.plan.test_stack(), &context)
                    .await;
            }
            None => info!("no cleanup configured"),
        }

        let route = body?;

        let fail_pipeline = pipeline.on_failure.as_ref().is_some_and(|f| f.fail_pipeline);
        if route == Some(Route::Failure) && fail_pipeline {
            let (failures, total) = context
                .test_result()
                .map(|r| (r.failure_count, r.total_count))
                .unwrap_or((1, 1));
            return Err(ShipflowError::TestsFailed { failures, total });
        }

        let duration = start.elapsed();
        info!(
            pipeline = %pipeline.name,
            route = route.map(|r| r.as_str()).unwrap_or("none"),
            duration_ms = duration.as_millis() as u64,
            "pipeline finished"
        );

        Ok(PipelineOutcome {
            pipeline: pipeline.name.clone(),
            context,
            route,
            warnings,
            duration,
        })
    }

    /// Everything between validation and cleanup
    ///
    /// `context` always holds the last context a stage completed, so cleanup
    /// sees the artifact even when a later stage fails.
    async fn run_stages(&self, context: &mut PipelineContext) -> ShipflowResult<Option<Route>> {
        let pipeline = &self.plan.pipeline;

        info!(pipeline = %pipeline.name, "build stage");
        *context = BuildStageExecutor::new(Arc::clone(&self.lookup))
            .execute(&pipeline.build, context)
            .await?;

        let mut failure_logs = None;
        match pipeline.test {
            Some(ref step) => {
                let stack =
                    self.plan
                        .test_stack()
                        .ok_or_else(|| ShipflowError::InvalidPipeline {
                            reason: format!("Stack '{}' is not declared", step.stack),
                            help: None,
                        })?;

                info!(pipeline = %pipeline.name, project = %stack.project, "test stage");
                let output = self.test_executor().execute(step, stack, context).await?;
                *context = output.context;
                failure_logs = output.failure_logs;
            }
            None => {
                info!(pipeline = %pipeline.name, "no test stage configured; skipping");
                *context = context.with_metadata("test.skipped", "true");
            }
        }

        let route = Route::for_result(context.test_result());
        *context = self
            .router()
            .route(
                pipeline.on_success.as_ref(),
                pipeline.on_failure.as_ref(),
                failure_logs.as_deref(),
                context,
            )
            .await?;

        Ok(route)
    }

    fn test_executor(&self) -> TestStageExecutor {
        let failure_logs = self
            .plan
            .pipeline
            .on_failure
            .as_ref()
            .and_then(|f| f.diagnostics.as_ref())
            .map(|d| LogOptions {
                services: d.services.clone(),
                tail: d.tail,
            });

        TestStageExecutor::new(Arc::clone(&self.lookup), Arc::clone(&self.environment))
            .with_failure_logs(failure_logs)
            .with_base_dir(self.base_dir.clone())
    }

    fn router(&self) -> ConditionalRouter {
        ConditionalRouter::new(
            SuccessPathExecutor::new(
                Arc::clone(&self.backend),
                Arc::clone(&self.lookup),
                self.plan.registries.clone(),
            )
            .with_base_dir(self.base_dir.clone()),
            FailurePathExecutor::new(Arc::clone(&self.backend), Arc::clone(&self.lookup))
                .with_base_dir(self.base_dir.clone()),
        )
    }

    fn always_executor(&self) -> AlwaysStageExecutor {
        AlwaysStageExecutor::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.environment),
            Arc::clone(&self.lookup),
        )
    }
}
