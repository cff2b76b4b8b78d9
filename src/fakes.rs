// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Scripted collaborators for unit tests

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::actions::{Action, ActionLookup, ActionOutcome, ActionRequest};
use crate::backend::{
    ArtifactRef, AuthConfig, BackendOperation, BuildRequest, Compression, ImageBackend, ImageRef,
};
use crate::environment::{
    EnvironmentLifecycle, EnvironmentState, LogOptions, ServiceInfo, ServiceStatus,
    StackDescriptor,
};
use crate::errors::{ShipflowError, ShipflowResult};
use crate::process::{CommandOutput, CommandRunner, CommandSpec};

/// Config used across pipeline tests
pub const SAMPLE_CONFIG: &str = r#"
version: "1"
images:
  app:
    repository: team/app:ci
stacks:
  it:
    files: [compose.yml]
    project: app-it
registries:
  prod:
    host: registry.example.com
    namespace: release
    auth:
      username: ci
      password_env: SHIPFLOW_TEST_REGISTRY_TOKEN
actions:
  integration:
    type: command
    command: make integration
pipelines:
  - name: release
    build:
      image: app
      build_args:
        VERSION: "1.2.3"
    test:
      stack: it
      action: integration
      wait:
        services: [db, api]
        state: healthy
        timeout_secs: 30
      reports: "build/reports/*.xml"
    on_success:
      tags: [stable, "1.2.3"]
      publish:
        targets:
          - registry: prod
    on_failure:
      tags: [failed]
      diagnostics:
        path: build/diagnostics.log
        services: [db, api]
    always:
      remove_images: true
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Command runner
// ─────────────────────────────────────────────────────────────────────────────

pub fn output_ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration: Duration::from_millis(1),
    }
}

pub fn output_err(exit_code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
        duration: Duration::from_millis(1),
    }
}

struct Rule {
    pattern: String,
    responses: VecDeque<CommandOutput>,
}

/// Records commands and answers them by substring match
///
/// The first rule whose pattern occurs in the command line answers. A rule's
/// responses are consumed in order and the last one repeats. Unmatched
/// commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, pattern: &str, output: CommandOutput) {
        self.respond_sequence(pattern, vec![output]);
    }

    pub fn respond_sequence(&self, pattern: &str, outputs: Vec<CommandOutput>) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            responses: outputs.into(),
        });
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|spec| spec.display().contains(pattern))
            .count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> ShipflowResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let line = spec.display();
        let mut rules = self.rules.lock().unwrap();
        let output = rules
            .iter_mut()
            .find(|rule| line.contains(&rule.pattern))
            .and_then(|rule| {
                if rule.responses.len() > 1 {
                    rule.responses.pop_front()
                } else {
                    rule.responses.front().cloned()
                }
            });

        Ok(output.unwrap_or_else(|| output_ok("")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Image backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Build {
        image: String,
        build_args: BTreeMap<String, String>,
    },
    Tag {
        source: String,
        targets: Vec<String>,
    },
    Save {
        image: String,
        output: PathBuf,
        compression: Compression,
    },
    Push {
        image: String,
        authenticated: bool,
    },
    Pull(String),
    Exists(String),
    Remove(String),
}

impl BackendCall {
    fn operation(&self) -> BackendOperation {
        match self {
            Self::Build { .. } => BackendOperation::Build,
            Self::Tag { .. } => BackendOperation::Tag,
            Self::Save { .. } => BackendOperation::Save,
            Self::Push { .. } => BackendOperation::Push,
            Self::Pull(_) => BackendOperation::Pull,
            Self::Exists(_) => BackendOperation::Exists,
            Self::Remove(_) => BackendOperation::Remove,
        }
    }
}

/// In-memory image backend recording every call
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<BackendCall>>,
    failing: Mutex<HashSet<BackendOperation>>,
    existing: Mutex<HashSet<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` fail
    pub fn fail_on(&self, operation: BackendOperation) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn mark_existing(&self, reference: &str) {
        self.existing.lock().unwrap().insert(reference.to_string());
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: BackendOperation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub fn tag_calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Tag { source, targets } => Some((source.clone(), targets.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Push { image, .. } => Some(image.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) -> ShipflowResult<()> {
        let operation = call.operation();
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&operation) {
            Err(ShipflowError::backend(operation, "scripted failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ImageBackend for FakeBackend {
    async fn build(&self, request: &BuildRequest) -> ShipflowResult<ArtifactRef> {
        self.record(BackendCall::Build {
            image: request.image.to_string(),
            build_args: request.build_args.clone(),
        })?;
        self.mark_existing(&request.image.to_string());
        Ok(ArtifactRef::new(
            format!("sha256:{}", request.image.repository),
            request.image.clone(),
        ))
    }

    async fn tag(&self, source: &ImageRef, targets: &[ImageRef]) -> ShipflowResult<()> {
        self.record(BackendCall::Tag {
            source: source.to_string(),
            targets: targets.iter().map(ToString::to_string).collect(),
        })
    }

    async fn save(
        &self,
        image: &ImageRef,
        output: &Path,
        compression: Compression,
    ) -> ShipflowResult<()> {
        self.record(BackendCall::Save {
            image: image.to_string(),
            output: output.to_path_buf(),
            compression,
        })
    }

    async fn push(&self, image: &ImageRef, auth: Option<&AuthConfig>) -> ShipflowResult<()> {
        self.record(BackendCall::Push {
            image: image.to_string(),
            authenticated: auth.is_some(),
        })
    }

    async fn pull(&self, image: &ImageRef, _auth: Option<&AuthConfig>) -> ShipflowResult<()> {
        self.record(BackendCall::Pull(image.to_string()))
    }

    async fn exists(&self, image: &ImageRef) -> ShipflowResult<bool> {
        let reference = image.to_string();
        self.record(BackendCall::Exists(reference.clone()))?;
        Ok(self.existing.lock().unwrap().contains(&reference))
    }

    async fn remove(&self, image: &ImageRef) -> ShipflowResult<()> {
        self.record(BackendCall::Remove(image.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Environment
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot with the given services and statuses
pub fn state_of(project: &str, services: &[(&str, ServiceStatus)]) -> EnvironmentState {
    EnvironmentState {
        project: project.to_string(),
        services: services
            .iter()
            .map(|(name, status)| {
                let info = ServiceInfo {
                    service: name.to_string(),
                    id: format!("{name}-id"),
                    name: format!("{project}-{name}-1"),
                    status: *status,
                    ports: Vec::new(),
                };
                (name.to_string(), info)
            })
            .collect(),
    }
}

/// Environment whose status polls follow a script
///
/// Statuses are consumed in order; the last one repeats.
#[derive(Default)]
pub struct FakeEnvironment {
    statuses: Mutex<VecDeque<EnvironmentState>>,
    failing: Mutex<HashSet<&'static str>>,
    up_calls: AtomicUsize,
    down_calls: AtomicUsize,
    status_calls: AtomicUsize,
    log_requests: Mutex<Vec<LogOptions>>,
}

impl FakeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every poll reports these services
    pub fn with_services(services: &[(&str, ServiceStatus)]) -> Self {
        let env = Self::new();
        env.push_status(state_of("test", services));
        env
    }

    pub fn push_status(&self, state: EnvironmentState) {
        self.statuses.lock().unwrap().push_back(state);
    }

    /// Make `operation` ("up", "down", "status" or "logs") fail
    pub fn fail_on(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn up_calls(&self) -> usize {
        self.up_calls.load(Ordering::SeqCst)
    }

    pub fn down_calls(&self) -> usize {
        self.down_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn log_requests(&self) -> Vec<LogOptions> {
        self.log_requests.lock().unwrap().clone()
    }

    /// Whether no lifecycle call was made at all
    pub fn untouched(&self) -> bool {
        self.up_calls() == 0 && self.down_calls() == 0 && self.status_calls() == 0
    }

    fn fails(&self, operation: &str) -> bool {
        self.failing.lock().unwrap().contains(operation)
    }

    fn next_status(&self, project: &str) -> EnvironmentState {
        let mut statuses = self.statuses.lock().unwrap();
        let mut state = if statuses.len() > 1 {
            statuses.pop_front().unwrap_or_default()
        } else {
            statuses.front().cloned().unwrap_or_default()
        };
        state.project = project.to_string();
        state
    }
}

#[async_trait]
impl EnvironmentLifecycle for FakeEnvironment {
    async fn up(&self, stack: &StackDescriptor) -> ShipflowResult<EnvironmentState> {
        self.up_calls.fetch_add(1, Ordering::SeqCst);
        if self.fails("up") {
            return Err(ShipflowError::EnvironmentStartFailed {
                project: stack.project.clone(),
                stderr: "scripted failure".into(),
            });
        }
        Ok(self.next_status(&stack.project))
    }

    async fn down(&self, stack: &StackDescriptor) -> ShipflowResult<()> {
        self.down_calls.fetch_add(1, Ordering::SeqCst);
        if self.fails("down") {
            return Err(ShipflowError::EnvironmentStopFailed {
                project: stack.project.clone(),
                stderr: "scripted failure".into(),
            });
        }
        Ok(())
    }

    async fn status(&self, stack: &StackDescriptor) -> ShipflowResult<EnvironmentState> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fails("status") {
            return Err(ShipflowError::StatusFailed {
                message: "scripted failure".into(),
            });
        }
        Ok(self.next_status(&stack.project))
    }

    async fn capture_logs(
        &self,
        stack: &StackDescriptor,
        options: &LogOptions,
    ) -> ShipflowResult<String> {
        self.log_requests.lock().unwrap().push(options.clone());
        if self.fails("logs") {
            return Err(ShipflowError::LogCaptureFailed {
                project: stack.project.clone(),
                stderr: "scripted failure".into(),
            });
        }
        let services = if options.services.is_empty() {
            vec!["all".to_string()]
        } else {
            options.services.clone()
        };
        Ok(services
            .iter()
            .map(|service| format!("{service}-1  | log line\n"))
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

/// What a scripted action does when run
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    Fail(i32),
    /// Produce a build artifact for the image reference
    Build(String),
    /// Write a report file, then exit with the code
    Report {
        path: PathBuf,
        contents: String,
        exit_code: i32,
    },
    /// Return an error instead of an outcome
    Error(String),
    Panic,
}

pub struct ScriptedAction {
    name: String,
    script: Script,
}

#[async_trait]
impl Action for ScriptedAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _request: &ActionRequest) -> ShipflowResult<ActionOutcome> {
        match &self.script {
            Script::Succeed => Ok(ActionOutcome::succeeded()),
            Script::Fail(code) => Ok(ActionOutcome::failed(*code, "scripted failure")),
            Script::Build(reference) => {
                let image = ImageRef::parse(reference)?;
                Ok(ActionOutcome::succeeded()
                    .with_artifact(ArtifactRef::new(format!("sha256:{}", image.repository), image)))
            }
            Script::Report {
                path,
                contents,
                exit_code,
            } => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, contents)?;
                Ok(if *exit_code == 0 {
                    ActionOutcome::succeeded()
                } else {
                    ActionOutcome::failed(*exit_code, "tests failed")
                })
            }
            Script::Error(message) => Err(ShipflowError::ActionFailed {
                action: self.name.clone(),
                message: message.clone(),
                help: None,
            }),
            Script::Panic => panic!("scripted panic in {}", self.name),
        }
    }
}

/// Lookup over scripted actions, recording every invocation
#[derive(Default)]
pub struct FakeLookup {
    actions: BTreeMap<String, Arc<ScriptedAction>>,
    invoked: Mutex<Vec<(String, ActionRequest)>>,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, script: Script) -> Self {
        self.actions.insert(
            name.to_string(),
            Arc::new(ScriptedAction {
                name: name.to_string(),
                script,
            }),
        );
        self
    }

    /// Names of invoked actions, in order
    pub fn invoked(&self) -> Vec<String> {
        self.invoked
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn was_invoked(&self, name: &str) -> bool {
        self.invoked().iter().any(|n| n == name)
    }

    /// Request of the last invocation of `name`
    pub fn last_request(&self, name: &str) -> Option<ActionRequest> {
        self.invoked
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, request)| request.clone())
    }
}

#[async_trait]
impl ActionLookup for FakeLookup {
    fn find(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions
            .get(name)
            .map(|action| action.clone() as Arc<dyn Action>)
    }

    async fn invoke(
        &self,
        action: &dyn Action,
        request: &ActionRequest,
    ) -> ShipflowResult<ActionOutcome> {
        self.invoked
            .lock()
            .unwrap()
            .push((action.name().to_string(), request.clone()));
        action.run(request).await
    }
}
