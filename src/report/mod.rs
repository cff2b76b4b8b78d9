// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Test result capture
//!
//! Turns whatever the test action left behind into a single [`TestResult`]:
//! aggregated JUnit report fragments when there are any, otherwise the
//! action's own exit status.

mod junit;

pub use junit::{safe_parse_int, JunitParser, SuiteCounts};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::actions::ActionOutcome;

/// Normalized outcome of a test stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub success: bool,
    pub executed: bool,
    pub up_to_date: bool,
    pub skipped: bool,
    pub failure_count: u32,
    pub total_count: u32,
}

impl TestResult {
    /// Result from counted tests
    ///
    /// `total_count` is raised to `failure_count` if a report under-reports it.
    pub fn from_counts(failure_count: u32, total_count: u32) -> Self {
        Self {
            success: failure_count == 0,
            executed: true,
            up_to_date: false,
            skipped: false,
            failure_count,
            total_count: total_count.max(failure_count),
        }
    }

    /// Result from a bare exit status: one test, passed or failed
    pub fn from_status(success: bool) -> Self {
        Self::from_counts(u32::from(!success), 1)
    }

    /// A test stage that could not produce a verdict
    pub fn infrastructure_failure() -> Self {
        Self::from_status(false)
    }

    /// Variables exported to the post-test hook
    pub fn exported_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("SHIPFLOW_TEST_SUCCESS".to_string(), self.success.to_string());
        env.insert("SHIPFLOW_TEST_EXECUTED".to_string(), self.executed.to_string());
        env.insert("SHIPFLOW_TEST_UP_TO_DATE".to_string(), self.up_to_date.to_string());
        env.insert("SHIPFLOW_TEST_SKIPPED".to_string(), self.skipped.to_string());
        env.insert("SHIPFLOW_TEST_FAILURES".to_string(), self.failure_count.to_string());
        env.insert("SHIPFLOW_TEST_TOTAL".to_string(), self.total_count.to_string());
        env
    }
}

/// Builds a [`TestResult`] for one test stage execution
#[derive(Debug, Clone, Default)]
pub struct TestResultCapture {
    /// Glob locating report fragments
    reports: Option<String>,
    /// Base for relative glob patterns
    base_dir: Option<PathBuf>,
}

impl TestResultCapture {
    pub fn new(reports: Option<String>) -> Self {
        Self {
            reports,
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Result of a test action that ran to completion
    ///
    /// Report fragments take precedence over the exit status when at least one
    /// of them is usable.
    pub async fn capture_from_task(&self, outcome: &ActionOutcome) -> TestResult {
        let mut result = match self.aggregate_reports().await {
            Some(counts) => {
                if !outcome.success && counts.failures == 0 {
                    warn!("test action failed but its reports show no failures");
                }
                TestResult::from_counts(counts.failures, counts.tests)
            }
            None => TestResult::from_status(outcome.success),
        };
        result.up_to_date = outcome.up_to_date;
        result
    }

    /// Result of a test action that could not complete
    pub fn capture_failure(&self, error: &str) -> TestResult {
        warn!(error, "test action did not complete");
        TestResult::infrastructure_failure()
    }

    async fn aggregate_reports(&self) -> Option<SuiteCounts> {
        let pattern = self.reports.as_deref()?;
        let pattern = match self.base_dir {
            Some(ref base) if !Path::new(pattern).is_absolute() => {
                base.join(pattern).to_string_lossy().to_string()
            }
            _ => pattern.to_string(),
        };

        let paths: Vec<PathBuf> = match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(Result::ok).collect(),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "invalid report pattern");
                return None;
            }
        };
        if paths.is_empty() {
            debug!(pattern = %pattern, "no test reports found");
            return None;
        }

        let parser = match JunitParser::new() {
            Ok(parser) => parser,
            Err(e) => {
                warn!(error = %e, "report parser unavailable");
                return None;
            }
        };

        let mut total = SuiteCounts::default();
        let mut usable = 0usize;
        for path in &paths {
            let xml = match tokio::fs::read_to_string(path).await {
                Ok(xml) => xml,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable test report");
                    continue;
                }
            };
            match parser.parse(&xml) {
                Some(counts) => {
                    total.tests = total.tests.saturating_add(counts.tests);
                    total.failures = total.failures.saturating_add(counts.failures);
                    total.skipped = total.skipped.saturating_add(counts.skipped);
                    usable += 1;
                }
                None => {
                    warn!(path = %path.display(), "skipping test report without a testsuite");
                }
            }
        }

        if usable == 0 {
            return None;
        }
        info!(
            reports = usable,
            tests = total.tests,
            failures = total.failures,
            "aggregated test reports"
        );
        Some(total)
    }
}
