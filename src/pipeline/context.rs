// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline execution context
//!
//! The context is a value. Stages receive one by reference and hand back a
//! new one, so a stage that fails leaves its caller's context untouched for
//! cleanup. Every transition bumps the revision, which makes two contexts from
//! different points of a run compare unequal even when nothing else changed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::backend::ArtifactRef;
use crate::errors::{ShipflowError, ShipflowResult};
use crate::report::TestResult;

/// State threaded through the stages of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineContext {
    revision: u64,
    built_artifact: Option<ArtifactRef>,
    test_result: Option<TestResult>,
    applied_tags: Vec<String>,
    metadata: BTreeMap<String, String>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn built_artifact(&self) -> Option<&ArtifactRef> {
        self.built_artifact.as_ref()
    }

    pub fn test_result(&self) -> Option<&TestResult> {
        self.test_result.as_ref()
    }

    /// Tags applied so far, in application order
    pub fn applied_tags(&self) -> &[String] {
        &self.applied_tags
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    fn next(&self) -> Self {
        let mut next = self.clone();
        next.revision += 1;
        next
    }

    /// The same state under a new revision
    ///
    /// Stages start from this so that running one always yields a distinct
    /// context, even when it ends up changing nothing else.
    pub fn advanced(&self) -> Self {
        self.next()
    }

    /// Record the built artifact; only one build per run
    pub fn with_artifact(&self, artifact: ArtifactRef) -> ShipflowResult<Self> {
        if self.built_artifact.is_some() {
            return Err(ShipflowError::ContextViolation {
                field: "built_artifact".to_string(),
            });
        }
        let mut next = self.next();
        next.built_artifact = Some(artifact);
        Ok(next)
    }

    /// Record the test result; only one test stage per run
    pub fn with_test_result(&self, result: TestResult) -> ShipflowResult<Self> {
        if self.test_result.is_some() {
            return Err(ShipflowError::ContextViolation {
                field: "test_result".to_string(),
            });
        }
        let mut next = self.next();
        next.test_result = Some(result);
        Ok(next)
    }

    /// Append tags, skipping ones already applied
    pub fn with_tags<I, S>(&self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.next();
        for tag in tags {
            let tag = tag.into();
            if !next.applied_tags.contains(&tag) {
                next.applied_tags.push(tag);
            }
        }
        next
    }

    /// Set a metadata entry, replacing any previous value
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.next();
        next.metadata.insert(key.into(), value.into());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ImageRef;

    fn artifact() -> ArtifactRef {
        ArtifactRef::new("sha256:1", ImageRef::new("app", "ci"))
    }

    #[test]
    fn test_every_transition_yields_a_distinct_context() {
        let start = PipelineContext::new();
        let built = start.with_artifact(artifact()).unwrap();
        let tested = built.with_test_result(TestResult::from_counts(0, 5)).unwrap();
        let tagged = tested.with_tags(Vec::<String>::new());
        let noted = tagged.with_metadata("k", "v");
        let renoted = noted.with_metadata("k", "v");
        let advanced = renoted.advanced();

        let chain = [&start, &built, &tested, &tagged, &noted, &renoted, &advanced];
        for (i, a) in chain.iter().enumerate() {
            for b in &chain[i + 1..] {
                assert_ne!(a, b);
                assert!(b.revision() > a.revision());
            }
        }

        // the originals are untouched
        assert!(start.built_artifact().is_none());
        assert!(built.test_result().is_none());
    }

    #[test]
    fn test_artifact_is_set_once() {
        let ctx = PipelineContext::new().with_artifact(artifact()).unwrap();
        match ctx.with_artifact(artifact()) {
            Err(ShipflowError::ContextViolation { field }) => assert_eq!(field, "built_artifact"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_test_result_is_set_once() {
        let ctx = PipelineContext::new()
            .with_test_result(TestResult::from_status(true))
            .unwrap();
        assert!(ctx.with_test_result(TestResult::from_status(false)).is_err());
        assert!(ctx.test_result().unwrap().success);
    }

    #[test]
    fn test_tags_are_ordered_and_deduplicated() {
        let ctx = PipelineContext::new()
            .with_tags(["stable", "1.0"])
            .with_tags(["1.0", "latest", "stable"]);
        assert_eq!(ctx.applied_tags(), ["stable", "1.0", "latest"]);
    }

    #[test]
    fn test_metadata_last_write_wins() {
        let ctx = PipelineContext::new()
            .with_metadata("build.up_to_date", "false")
            .with_metadata("build.up_to_date", "true");
        assert_eq!(ctx.metadata()["build.up_to_date"], "true");
    }
}
