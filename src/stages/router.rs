// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Routing between the success and failure paths

use tracing::info;

use super::{FailurePathExecutor, SuccessPathExecutor};
use crate::errors::ShipflowResult;
use crate::pipeline::{FailureStep, PipelineContext, SuccessStep};
use crate::report::TestResult;

/// Which path a test result leads to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Success,
    Failure,
}

impl Route {
    /// `None` when there is no test result to route on
    pub fn for_result(result: Option<&TestResult>) -> Option<Self> {
        result.map(|r| if r.success { Self::Success } else { Self::Failure })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// A route together with its configured step
#[derive(Debug, Clone, Copy)]
pub enum ConditionalPath<'a> {
    Success(&'a SuccessStep),
    Failure(&'a FailureStep),
}

impl<'a> ConditionalPath<'a> {
    /// The step for `route`, if the pipeline configures one
    pub fn select(
        route: Route,
        on_success: Option<&'a SuccessStep>,
        on_failure: Option<&'a FailureStep>,
    ) -> Option<Self> {
        match route {
            Route::Success => on_success.map(Self::Success),
            Route::Failure => on_failure.map(Self::Failure),
        }
    }
}

/// Dispatches to exactly one of the two path executors
pub struct ConditionalRouter {
    success: SuccessPathExecutor,
    failure: FailurePathExecutor,
}

impl ConditionalRouter {
    pub fn new(success: SuccessPathExecutor, failure: FailurePathExecutor) -> Self {
        Self { success, failure }
    }

    /// Run the path matching the context's test result
    ///
    /// Without a test result the context comes back unchanged. A route with
    /// no step still yields a new revision. Only the success path can fail.
    pub async fn route(
        &self,
        on_success: Option<&SuccessStep>,
        on_failure: Option<&FailureStep>,
        failure_logs: Option<&str>,
        context: &PipelineContext,
    ) -> ShipflowResult<PipelineContext> {
        let Some(route) = Route::for_result(context.test_result()) else {
            info!("no test result; skipping conditional paths");
            return Ok(context.clone());
        };

        if let Some(result) = context.test_result() {
            info!(
                route = route.as_str(),
                failures = result.failure_count,
                total = result.total_count,
                "routing"
            );
        }

        match ConditionalPath::select(route, on_success, on_failure) {
            Some(ConditionalPath::Success(step)) => self.success.execute(step, context).await,
            Some(ConditionalPath::Failure(step)) => {
                Ok(self.failure.execute(step, failure_logs, context).await)
            }
            None => {
                info!(route = route.as_str(), "no step configured for route");
                Ok(context.advanced())
            }
        }
    }
}
