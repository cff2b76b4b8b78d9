// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Resolved pipeline plans
//!
//! A plan is one pipeline plus everything it references, detached from the
//! config file. It is plain data, so it can be cached and replayed; the live
//! collaborators are bound to it only when the driver runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::actions::ActionCatalog;
use crate::environment::StackDescriptor;
use crate::errors::{ShipflowError, ShipflowResult};
use crate::pipeline::{PipelineSpec, ProjectConfig, RegistrySpec, Settings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub pipeline: PipelineSpec,

    /// Stacks the pipeline references
    #[serde(default)]
    pub stacks: BTreeMap<String, StackDescriptor>,

    /// Registries the pipeline publishes to
    #[serde(default)]
    pub registries: BTreeMap<String, RegistrySpec>,

    pub catalog: ActionCatalog,

    #[serde(default)]
    pub settings: Settings,

    /// Fingerprint of the config the plan was resolved from
    #[serde(default)]
    pub fingerprint: String,
}

impl PipelinePlan {
    /// Resolve `name` from a config
    ///
    /// Undeclared stacks and registries are left out rather than rejected;
    /// validation reports them.
    pub fn resolve(config: &ProjectConfig, name: &str) -> ShipflowResult<Self> {
        let pipeline = config.pipeline(name)?.clone();

        let stacks = pipeline
            .test
            .iter()
            .filter_map(|test| {
                config
                    .stacks
                    .get(&test.stack)
                    .map(|stack| (test.stack.clone(), stack.clone()))
            })
            .collect();

        let registries = pipeline
            .on_success
            .iter()
            .filter_map(|success| success.publish.as_ref())
            .flat_map(|publish| publish.targets.iter())
            .filter_map(|target| {
                config
                    .registries
                    .get(&target.registry)
                    .map(|registry| (target.registry.clone(), registry.clone()))
            })
            .collect();

        Ok(Self {
            pipeline,
            stacks,
            registries,
            catalog: config.catalog(),
            settings: config.settings.clone(),
            fingerprint: String::new(),
        })
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }

    /// Stack of the test stage, if there is one
    pub fn test_stack(&self) -> Option<&StackDescriptor> {
        self.pipeline
            .test
            .as_ref()
            .and_then(|test| self.stacks.get(&test.stack))
    }

    /// A declared registry
    pub fn registry(&self, name: &str) -> ShipflowResult<&RegistrySpec> {
        self.registries
            .get(name)
            .ok_or_else(|| ShipflowError::InvalidPipeline {
                reason: format!("Registry '{}' is not declared", name),
                help: None,
            })
    }
}
