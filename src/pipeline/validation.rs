// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline validation
//!
//! Validates pipeline configuration before any stage runs.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::actions::{ActionCatalog, ActionDefinition};
use crate::backend::is_valid_tag;
use crate::environment::StackDescriptor;
use crate::errors::{ShipflowError, ShipflowResult};
use crate::pipeline::{PipelinePlan, PipelineSpec, ProjectConfig, RegistrySpec};

/// Pipeline validator
pub struct PipelineValidator;

/// What a pipeline can see while being validated
struct Scope<'a> {
    catalog: &'a ActionCatalog,
    stacks: &'a BTreeMap<String, StackDescriptor>,
    registries: &'a BTreeMap<String, RegistrySpec>,
}

impl PipelineValidator {
    /// Validate a resolved plan
    pub fn validate_plan(plan: &PipelinePlan) -> ValidationResult {
        let mut result = ValidationResult::new();
        let scope = Scope {
            catalog: &plan.catalog,
            stacks: &plan.stacks,
            registries: &plan.registries,
        };
        Self::validate_pipeline(&plan.pipeline, &scope, &mut result);
        result
    }

    /// Validate every pipeline of a config, plus cross-pipeline rules
    pub fn validate_config(config: &ProjectConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.pipelines.is_empty() {
            result.add_error("No pipelines defined");
        }

        let mut seen_names = HashSet::new();
        for pipeline in &config.pipelines {
            if !seen_names.insert(pipeline.name.as_str()) {
                result.add_error(&format!("Duplicate pipeline name: '{}'", pipeline.name));
            }
        }

        // Concurrent runs of two pipelines would fight over one project.
        let mut projects: HashMap<&str, Vec<&str>> = HashMap::new();
        for pipeline in &config.pipelines {
            if let Some(stack) = pipeline
                .test
                .as_ref()
                .and_then(|test| config.stacks.get(&test.stack))
            {
                projects
                    .entry(stack.project.as_str())
                    .or_default()
                    .push(pipeline.name.as_str());
            }
        }
        let mut shared: Vec<_> = projects.into_iter().filter(|(_, p)| p.len() > 1).collect();
        shared.sort();
        for (project, pipelines) in shared {
            result.add_warning(&format!(
                "Pipelines {} share stack project '{}' and cannot run concurrently",
                pipelines.join(", "),
                project
            ));
        }

        let catalog = config.catalog();
        let scope = Scope {
            catalog: &catalog,
            stacks: &config.stacks,
            registries: &config.registries,
        };
        for pipeline in &config.pipelines {
            Self::validate_pipeline(pipeline, &scope, &mut result);
        }

        result
    }

    /// Validate a single pipeline
    fn validate_pipeline(pipeline: &PipelineSpec, scope: &Scope<'_>, result: &mut ValidationResult) {
        let name = &pipeline.name;
        if name.trim().is_empty() {
            result.add_error("Pipeline name is empty");
        }

        // Build
        match scope.catalog.images.get(&pipeline.build.image) {
            Some(image) => {
                if let Err(e) = image.image_ref() {
                    result.add_error(&format!("Pipeline '{}': {}", name, e));
                }
            }
            None => result.add_error(&format!(
                "Pipeline '{}': Build image '{}' is not declared",
                name, pipeline.build.image
            )),
        }

        for (action, context) in pipeline.referenced_actions() {
            if action.trim().is_empty() {
                result.add_error(&format!("Pipeline '{}': {} names no action", name, context));
            } else if !scope.catalog.contains(&action) {
                result.add_missing_action(&action, &format!("pipeline '{}', {}", name, context));
            } else if let Some(ActionDefinition::Build { image }) = scope.catalog.actions.get(&action) {
                if !scope.catalog.images.contains_key(image) {
                    result.add_error(&format!(
                        "Pipeline '{}': Action '{}' builds undeclared image '{}'",
                        name, action, image
                    ));
                }
            }
        }

        // Test
        match pipeline.test {
            Some(ref test) => {
                match scope.stacks.get(&test.stack) {
                    Some(stack) if stack.files.is_empty() => result.add_error(&format!(
                        "Pipeline '{}': Stack '{}' has no compose files",
                        name, test.stack
                    )),
                    Some(stack) if stack.project.trim().is_empty() => result.add_error(&format!(
                        "Pipeline '{}': Stack '{}' has an empty project name",
                        name, test.stack
                    )),
                    Some(_) => {}
                    None => result.add_error(&format!(
                        "Pipeline '{}': Stack '{}' is not declared",
                        name, test.stack
                    )),
                }

                if let Some(ref wait) = test.wait {
                    if wait.services.is_empty() {
                        result.add_error(&format!("Pipeline '{}': Wait lists no services", name));
                    }
                    if wait.timeout_secs == 0 {
                        result.add_error(&format!("Pipeline '{}': Wait timeout must be positive", name));
                    }
                    if wait.poll_interval_secs == 0 {
                        result.add_error(&format!(
                            "Pipeline '{}': Wait poll interval must be positive",
                            name
                        ));
                    } else if wait.poll_interval_secs > wait.timeout_secs {
                        result.add_warning(&format!(
                            "Pipeline '{}': Poll interval ({}s) exceeds the wait timeout ({}s); \
                             services are checked only once",
                            name, wait.poll_interval_secs, wait.timeout_secs
                        ));
                    }
                }
            }
            None => {
                if pipeline.on_success.is_some() || pipeline.on_failure.is_some() {
                    result.add_warning(&format!(
                        "Pipeline '{}': Success and failure paths never run without a test stage",
                        name
                    ));
                }
                if pipeline
                    .always
                    .as_ref()
                    .is_some_and(|always| always.teardown_stack)
                {
                    result.add_warning(&format!(
                        "Pipeline '{}': teardown_stack has no effect without a test stage",
                        name
                    ));
                }
            }
        }

        // Success path
        if let Some(ref success) = pipeline.on_success {
            Self::validate_tags(name, "success tag", &success.tags, result);

            if let Some(ref publish) = success.publish {
                if publish.targets.is_empty() {
                    result.add_warning(&format!("Pipeline '{}': Publish has no targets", name));
                }
                Self::validate_tags(name, "publish tag", &publish.tags, result);
                for target in &publish.targets {
                    if !scope.registries.contains_key(&target.registry) {
                        result.add_error(&format!(
                            "Pipeline '{}': Registry '{}' is not declared",
                            name, target.registry
                        ));
                    }
                    Self::validate_tags(name, "publish tag", &target.tags, result);
                }
            }
        }

        // Failure path
        if let Some(ref failure) = pipeline.on_failure {
            Self::validate_tags(name, "failure tag", &failure.tags, result);
            if failure.diagnostics.is_some() && pipeline.test.is_none() {
                result.add_warning(&format!(
                    "Pipeline '{}': Diagnostics need a test stack to capture logs from",
                    name
                ));
            }
        }
    }

    fn validate_tags(pipeline: &str, kind: &str, tags: &[String], result: &mut ValidationResult) {
        for tag in tags.iter().filter(|tag| !is_valid_tag(tag)) {
            result.add_error(&format!("Pipeline '{}': Invalid {} '{}'", pipeline, kind, tag));
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Unresolvable actions as (name, where it is used)
    pub missing_actions: Vec<(String, String)>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn add_missing_action(&mut self, name: &str, context: &str) {
        self.missing_actions
            .push((name.to_string(), context.to_string()));
        self.errors
            .push(format!("Action '{}' not found ({})", name, context));
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Turn the first problem into an error
    ///
    /// Missing actions take precedence so callers see
    /// [`ShipflowError::ActionNotFound`] naming the expected identifier.
    pub fn into_result(self) -> ShipflowResult<Vec<String>> {
        if let Some((name, context)) = self.missing_actions.into_iter().next() {
            return Err(ShipflowError::ActionNotFound { name, context });
        }
        if !self.errors.is_empty() {
            let help = (self.errors.len() > 1)
                .then(|| format!("{} problems found; run 'shipflow validate' for the full list", self.errors.len()));
            return Err(ShipflowError::InvalidPipeline {
                reason: self.errors.join("; "),
                help,
            });
        }
        Ok(self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::SAMPLE_CONFIG;

    fn config() -> ProjectConfig {
        ProjectConfig::from_yaml(SAMPLE_CONFIG).unwrap()
    }

    #[test]
    fn test_sample_config_is_valid() {
        let result = PipelineValidator::validate_config(&config());
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(!result.has_warnings(), "{:?}", result.warnings);
    }

    #[test]
    fn test_missing_build_action_is_action_not_found() {
        let mut config = config();
        config.pipelines[0].build.action = Some("build:web".into());

        let result = PipelineValidator::validate_config(&config);
        assert_eq!(result.missing_actions[0].0, "build:web");
        match result.into_result() {
            Err(ShipflowError::ActionNotFound { name, context }) => {
                assert_eq!(name, "build:web");
                assert!(context.contains("build stage"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_undeclared_references() {
        let mut config = config();
        let pipeline = &mut config.pipelines[0];
        pipeline.build.image = "web".into();
        pipeline.build.action = Some("build:app".into());
        pipeline.test.as_mut().unwrap().stack = "other".into();
        pipeline
            .on_success
            .as_mut()
            .unwrap()
            .publish
            .as_mut()
            .unwrap()
            .targets[0]
            .registry = "staging".into();

        let result = PipelineValidator::validate_config(&config);
        assert!(result.missing_actions.is_empty());
        assert!(result.errors.iter().any(|e| e.contains("Build image 'web'")));
        assert!(result.errors.iter().any(|e| e.contains("Stack 'other'")));
        assert!(result.errors.iter().any(|e| e.contains("Registry 'staging'")));
        assert!(matches!(
            result.into_result(),
            Err(ShipflowError::InvalidPipeline { .. })
        ));
    }

    #[test]
    fn test_wait_rules() {
        let mut config = config();
        let wait = config.pipelines[0]
            .test
            .as_mut()
            .unwrap()
            .wait
            .as_mut()
            .unwrap();
        wait.poll_interval_secs = 45;

        let result = PipelineValidator::validate_config(&config);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("Poll interval")));

        let mut config = self::config();
        let wait = config.pipelines[0]
            .test
            .as_mut()
            .unwrap()
            .wait
            .as_mut()
            .unwrap();
        wait.services.clear();
        wait.timeout_secs = 0;

        let result = PipelineValidator::validate_config(&config);
        assert!(result.errors.iter().any(|e| e.contains("no services")));
        assert!(result.errors.iter().any(|e| e.contains("timeout must be positive")));
    }

    #[test]
    fn test_invalid_tags() {
        let mut config = config();
        config.pipelines[0].on_failure.as_mut().unwrap().tags = vec!["-bad".into(), "ok".into()];

        let result = PipelineValidator::validate_config(&config);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("'-bad'"));
    }

    #[test]
    fn test_duplicate_names_and_shared_projects() {
        let mut config = config();
        let copy = config.pipelines[0].clone();
        config.pipelines.push(copy);

        let result = PipelineValidator::validate_config(&config);
        assert!(result.errors.iter().any(|e| e.contains("Duplicate pipeline name")));
        assert!(result.warnings.iter().any(|w| w.contains("app-it")));
    }

    #[test]
    fn test_paths_without_test_stage_warn() {
        let mut config = config();
        config.pipelines[0].test = None;

        let result = PipelineValidator::validate_config(&config);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("never run")));
        assert!(result.warnings.iter().any(|w| w.contains("Diagnostics")));
    }
}
