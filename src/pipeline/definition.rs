// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline definition structures
//!
//! Defines the schema for .shipflow.yaml (or .shipflow.toml) files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::actions::{build_action_name, ActionCatalog, ActionDefinition};
use crate::backend::{AuthConfig, Compression, ImageRef};
use crate::environment::{ReadinessState, StackDescriptor};
use crate::errors::{ShipflowError, ShipflowResult};

/// Config file names searched in order
pub const CONFIG_FILE_NAMES: &[&str] = &[".shipflow.yaml", ".shipflow.yml", ".shipflow.toml"];

/// Project configuration from .shipflow.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Config version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub settings: Settings,

    /// Buildable images by name
    #[serde(default)]
    pub images: BTreeMap<String, ImageSpec>,

    /// Service groups by name
    #[serde(default)]
    pub stacks: BTreeMap<String, StackDescriptor>,

    /// Publish destinations by name
    #[serde(default)]
    pub registries: BTreeMap<String, RegistrySpec>,

    /// Named actions
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDefinition>,

    pub pipelines: Vec<PipelineSpec>,
}

fn default_version() -> String {
    "1".to_string()
}

impl ProjectConfig {
    /// Load configuration, choosing the format by extension
    pub fn from_file(path: &Path) -> ShipflowResult<Self> {
        if !path.exists() {
            return Err(ShipflowError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ShipflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> ShipflowResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Parse configuration from TOML
    pub fn from_toml(content: &str) -> ShipflowResult<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Find the config file in `dir`
    pub fn locate(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Get a pipeline by name
    pub fn pipeline(&self, name: &str) -> ShipflowResult<&PipelineSpec> {
        self.pipelines
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ShipflowError::UnknownPipeline {
                name: name.to_string(),
                available: self.pipeline_names().join(", "),
            })
    }

    /// Get all pipeline names
    pub fn pipeline_names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name.as_str()).collect()
    }

    /// Serializable catalog of every image and action
    pub fn catalog(&self) -> ActionCatalog {
        ActionCatalog::new(
            self.images.clone(),
            self.actions.clone(),
            self.settings.command_timeout_secs,
        )
    }
}

/// Tool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Container CLI
    #[serde(default = "default_docker")]
    pub docker: String,

    /// Standalone compose binary; `<docker> compose` when unset
    #[serde(default)]
    pub compose: Option<String>,

    /// Bound for every external command besides builds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Plan cache directory
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_docker() -> String {
    "docker".to_string()
}

fn default_command_timeout() -> u64 {
    crate::process::DEFAULT_COMMAND_TIMEOUT.as_secs()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".shipflow").join("cache")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            docker: default_docker(),
            compose: None,
            command_timeout_secs: default_command_timeout(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl Settings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// A buildable image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Reference the image is built as, e.g. `team/app:ci`
    pub repository: String,

    /// Build context
    #[serde(default = "default_context")]
    pub context: PathBuf,

    #[serde(default)]
    pub dockerfile: Option<PathBuf>,

    #[serde(default)]
    pub build_args: BTreeMap<String, String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Multi-stage build target
    #[serde(default)]
    pub target: Option<String>,

    /// Always pull base images
    #[serde(default)]
    pub pull: bool,

    #[serde(default)]
    pub no_cache: bool,

    /// Reuse an existing local image instead of building
    #[serde(default)]
    pub skip_if_exists: bool,
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

impl ImageSpec {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            context: default_context(),
            dockerfile: None,
            build_args: BTreeMap::new(),
            labels: BTreeMap::new(),
            target: None,
            pull: false,
            no_cache: false,
            skip_if_exists: false,
        }
    }

    pub fn image_ref(&self) -> ShipflowResult<ImageRef> {
        ImageRef::parse(&self.repository)
    }
}

/// A publish destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySpec {
    /// Registry host, with port if any
    pub host: String,

    /// Namespace images are pushed under; keeps the source namespace when unset
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub auth: Option<RegistryAuth>,
}

/// Registry credentials; the password comes from the environment or a literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,
}

impl RegistrySpec {
    /// Resolve credentials, reading the environment at call time
    pub fn resolve_auth(&self, name: &str) -> ShipflowResult<Option<AuthConfig>> {
        let Some(ref auth) = self.auth else {
            return Ok(None);
        };

        let password = match (&auth.password_env, &auth.password) {
            (Some(variable), _) => {
                std::env::var(variable).map_err(|_| ShipflowError::MissingCredential {
                    registry: name.to_string(),
                    variable: variable.clone(),
                })?
            }
            (None, Some(password)) => password.clone(),
            (None, None) => {
                return Err(ShipflowError::MissingCredential {
                    registry: name.to_string(),
                    variable: "password".to_string(),
                })
            }
        };

        Ok(Some(AuthConfig {
            username: auth.username.clone(),
            password,
            server: Some(self.host.clone()),
        }))
    }
}

/// A pipeline: build, optional test, conditional paths, cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Pipeline name (must be unique within the config)
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub build: BuildStep,

    #[serde(default)]
    pub test: Option<TestStep>,

    #[serde(default)]
    pub on_success: Option<SuccessStep>,

    #[serde(default)]
    pub on_failure: Option<FailureStep>,

    #[serde(default)]
    pub always: Option<AlwaysStep>,
}

impl PipelineSpec {
    /// Every action name the pipeline invokes, with where it is used
    pub fn referenced_actions(&self) -> Vec<(String, &'static str)> {
        let mut refs = vec![(self.build.action_name(), "build stage")];
        let mut hook = |name: &Option<String>, context: &'static str| {
            if let Some(name) = name {
                refs.push((name.clone(), context));
            }
        };

        hook(&self.build.pre_hook, "build pre-hook");
        hook(&self.build.post_hook, "build post-hook");
        if let Some(ref test) = self.test {
            hook(&test.pre_hook, "test pre-hook");
            hook(&test.post_hook, "test post-hook");
        }
        if let Some(ref success) = self.on_success {
            hook(&success.post_hook, "success hook");
        }
        if let Some(ref failure) = self.on_failure {
            hook(&failure.post_hook, "failure hook");
        }
        if let Some(ref always) = self.always {
            hook(&always.hook, "cleanup hook");
        }
        if let Some(ref test) = self.test {
            refs.push((test.action.clone(), "test stage"));
        }
        refs
    }
}

/// Build stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    /// Declared image to build
    pub image: String,

    /// Build action; `build:<image>` when unset
    #[serde(default)]
    pub action: Option<String>,

    /// Build argument overrides
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,

    #[serde(default)]
    pub pre_hook: Option<String>,

    #[serde(default)]
    pub post_hook: Option<String>,
}

impl BuildStep {
    pub fn action_name(&self) -> String {
        self.action
            .clone()
            .unwrap_or_else(|| build_action_name(&self.image))
    }
}

/// Test stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStep {
    /// Declared stack the tests run against
    pub stack: String,

    /// Test action
    pub action: String,

    #[serde(default)]
    pub wait: Option<WaitStep>,

    /// Glob locating JUnit XML report fragments
    #[serde(default)]
    pub reports: Option<String>,

    /// Where to write the environment snapshot before tests run
    #[serde(default)]
    pub status_file: Option<PathBuf>,

    /// Extra environment for the test action
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub pre_hook: Option<String>,

    #[serde(default)]
    pub post_hook: Option<String>,
}

/// Readiness requirement checked after the stack starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitStep {
    pub services: Vec<String>,

    #[serde(default)]
    pub state: ReadinessState,

    #[serde(default = "default_wait_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_wait_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    2
}

impl WaitStep {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Success path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessStep {
    /// Additional tags for the artifact
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub archive: Option<ArchiveStep>,

    #[serde(default)]
    pub publish: Option<PublishStep>,

    #[serde(default)]
    pub post_hook: Option<String>,
}

/// Export of the artifact to a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveStep {
    pub path: PathBuf,

    #[serde(default)]
    pub compression: Compression,
}

/// Publication to registries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishStep {
    /// Tags pushed to every target without its own list; the source tag when empty
    #[serde(default)]
    pub tags: Vec<String>,

    pub targets: Vec<PublishTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishTarget {
    /// Declared registry name
    pub registry: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl PublishStep {
    /// Tags for `target`: its own, else the default list, else `source_tag`
    pub fn tags_for(&self, target: &PublishTarget, source_tag: &str) -> Vec<String> {
        if !target.tags.is_empty() {
            target.tags.clone()
        } else if !self.tags.is_empty() {
            self.tags.clone()
        } else {
            vec![source_tag.to_string()]
        }
    }
}

/// Failure path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureStep {
    /// Failure-marker tags
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub diagnostics: Option<DiagnosticsStep>,

    #[serde(default)]
    pub post_hook: Option<String>,

    /// Exit non-zero after the failure path ran
    #[serde(default)]
    pub fail_pipeline: bool,
}

/// Log capture from the test stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsStep {
    pub path: PathBuf,

    /// Services to capture; all when empty
    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default)]
    pub tail: Option<usize>,
}

/// Cleanup run on every exit path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlwaysStep {
    /// Remove the built image and every tag the pipeline applied
    #[serde(default)]
    pub remove_images: bool,

    /// Tear the test stack down again (for stacks left over by a crash)
    #[serde(default)]
    pub teardown_stack: bool,

    #[serde(default)]
    pub hook: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::SAMPLE_CONFIG as SAMPLE;

    #[test]
    fn test_parse_yaml_config() {
        let config = ProjectConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.settings.docker, "docker");
        assert_eq!(config.settings.command_timeout_secs, 300);

        let pipeline = config.pipeline("release").unwrap();
        assert_eq!(pipeline.build.action_name(), "build:app");

        let test = pipeline.test.as_ref().unwrap();
        let wait = test.wait.as_ref().unwrap();
        assert_eq!(wait.state, ReadinessState::Healthy);
        assert_eq!(wait.poll_interval(), Duration::from_secs(2));

        let on_failure = pipeline.on_failure.as_ref().unwrap();
        assert!(!on_failure.fail_pipeline);
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[images.app]
repository = "team/app"

[[pipelines]]
name = "ci"
[pipelines.build]
image = "app"
"#;
        let config = ProjectConfig::from_toml(toml).unwrap();
        assert_eq!(config.pipelines[0].name, "ci");
        assert!(config.pipelines[0].test.is_none());
        assert_eq!(config.images["app"].image_ref().unwrap().tag, "latest");
    }

    #[test]
    fn test_unknown_pipeline_lists_available() {
        let config = ProjectConfig::from_yaml(SAMPLE).unwrap();
        match config.pipeline("nightly") {
            Err(ShipflowError::UnknownPipeline { available, .. }) => {
                assert_eq!(available, "release")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_referenced_actions() {
        let config = ProjectConfig::from_yaml(SAMPLE).unwrap();
        let names: Vec<String> = config.pipelines[0]
            .referenced_actions()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["build:app", "integration"]);
    }

    #[test]
    fn test_publish_tag_precedence() {
        let publish = PublishStep {
            tags: vec!["1.0".into()],
            targets: vec![],
        };
        let own = PublishTarget {
            registry: "prod".into(),
            tags: vec!["edge".into()],
        };
        let bare = PublishTarget {
            registry: "prod".into(),
            tags: vec![],
        };

        assert_eq!(publish.tags_for(&own, "ci"), vec!["edge"]);
        assert_eq!(publish.tags_for(&bare, "ci"), vec!["1.0"]);
        assert_eq!(PublishStep::default().tags_for(&bare, "ci"), vec!["ci"]);
    }

    #[test]
    fn test_resolve_auth() {
        let mut registry = RegistrySpec {
            host: "registry.example.com".into(),
            namespace: None,
            auth: Some(RegistryAuth {
                username: "ci".into(),
                password: Some("literal".into()),
                password_env: None,
            }),
        };
        let auth = registry.resolve_auth("prod").unwrap().unwrap();
        assert_eq!(auth.password, "literal");
        assert_eq!(auth.server.as_deref(), Some("registry.example.com"));

        registry.auth = Some(RegistryAuth {
            username: "ci".into(),
            password: None,
            password_env: Some("SHIPFLOW_UNSET_VARIABLE_FOR_TEST".into()),
        });
        assert!(matches!(
            registry.resolve_auth("prod"),
            Err(ShipflowError::MissingCredential { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_file_and_locate() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProjectConfig::locate(dir.path()).is_none());

        let path = dir.path().join(".shipflow.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        assert_eq!(ProjectConfig::locate(dir.path()), Some(path.clone()));
        let config = ProjectConfig::from_file(&path).unwrap();
        assert_eq!(config.pipeline_names(), vec!["release"]);

        assert!(matches!(
            ProjectConfig::from_file(&dir.path().join("missing.yaml")),
            Err(ShipflowError::PipelineNotFound { .. })
        ));
    }
}
