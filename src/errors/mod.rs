// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Error types with remediation hints
//!
//! Every failure a pipeline can hit is a variant of [`ShipflowError`]. The
//! variants carry enough context for the CLI to explain what went wrong and,
//! where possible, how to fix it.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendOperation;

/// Result type for shipflow operations
pub type ShipflowResult<T> = Result<T, ShipflowError>;

/// Main error type for shipflow
#[derive(Error, Debug, Diagnostic)]
pub enum ShipflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Action '{name}' not found ({context})")]
    #[diagnostic(
        code(shipflow::action_not_found),
        help("Declare the action under 'actions:' or the image under 'images:' in your config")
    )]
    ActionNotFound { name: String, context: String },

    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(shipflow::pipeline_not_found),
        help("Create a .shipflow.yaml or pass --file")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Pipeline '{name}' is not defined")]
    #[diagnostic(code(shipflow::unknown_pipeline), help("Available pipelines: {available}"))]
    UnknownPipeline { name: String, available: String },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(shipflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid image reference '{reference}': {reason}")]
    #[diagnostic(
        code(shipflow::invalid_reference),
        help("References look like [registry/][namespace/]repository[:tag]")
    )]
    InvalidReference { reference: String, reason: String },

    #[error("Pipeline context field '{field}' can only be set once")]
    #[diagnostic(code(shipflow::context_violation))]
    ContextViolation { field: String },

    #[error("Credentials for registry '{registry}' are missing: ${variable} is not set")]
    #[diagnostic(
        code(shipflow::missing_credential),
        help("Export {variable} before running the pipeline")
    )]
    MissingCredential { registry: String, variable: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Stage Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Build of image '{image}' failed: {message}")]
    #[diagnostic(code(shipflow::build_failed))]
    BuildFailed {
        image: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Action '{action}' failed: {message}")]
    #[diagnostic(code(shipflow::action_failed))]
    ActionFailed {
        action: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{stage} hook '{hook}' failed: {message}")]
    #[diagnostic(code(shipflow::hook_failed))]
    HookFailed {
        stage: String,
        hook: String,
        message: String,
    },

    #[error("Tests failed: {failures} of {total} failed")]
    #[diagnostic(
        code(shipflow::tests_failed),
        help("The failure path ran; set 'fail_pipeline: false' to treat test failures as a clean outcome")
    )]
    TestsFailed { failures: u32, total: u32 },

    // ─────────────────────────────────────────────────────────────────────────
    // Environment Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to start environment '{project}'")]
    #[diagnostic(code(shipflow::environment_start_failed), help("{stderr}"))]
    EnvironmentStartFailed { project: String, stderr: String },

    #[error("Failed to stop environment '{project}'")]
    #[diagnostic(code(shipflow::environment_stop_failed), help("{stderr}"))]
    EnvironmentStopFailed { project: String, stderr: String },

    #[error(
        "Services in '{project}' did not become {target} within {timeout_secs}s: {}",
        .services.join(", ")
    )]
    #[diagnostic(
        code(shipflow::service_timeout),
        help("Inspect the services with 'shipflow env logs' or raise the wait timeout")
    )]
    ServiceTimeout {
        project: String,
        target: String,
        services: Vec<String>,
        timeout_secs: u64,
    },

    #[error("Failed to capture logs of environment '{project}'")]
    #[diagnostic(code(shipflow::log_capture_failed), help("{stderr}"))]
    LogCaptureFailed { project: String, stderr: String },

    #[error("Failed to read environment status: {message}")]
    #[diagnostic(code(shipflow::status_failed))]
    StatusFailed { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Backend / Process Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Image {operation} failed: {message}")]
    #[diagnostic(code(shipflow::backend))]
    Backend {
        operation: BackendOperation,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(shipflow::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("Command '{command}' could not be executed: {error}")]
    #[diagnostic(code(shipflow::command_failed))]
    CommandFailed {
        command: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    #[error("Command '{command}' timed out after {timeout_secs}s")]
    #[diagnostic(code(shipflow::command_timeout))]
    CommandTimeout { command: String, timeout_secs: u64 },

    // ─────────────────────────────────────────────────────────────────────────
    // File / Cache Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(shipflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(shipflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("Cache error: {message}")]
    #[diagnostic(code(shipflow::cache_error))]
    CacheError { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(shipflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(shipflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(shipflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(shipflow::toml_error))]
    Toml { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(shipflow::glob_error))]
    GlobPattern { message: String },

    #[error("Regex error: {message}")]
    #[diagnostic(code(shipflow::regex_error))]
    Regex { message: String },
}

impl From<std::io::Error> for ShipflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for ShipflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for ShipflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for ShipflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for ShipflowError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl From<regex::Error> for ShipflowError {
    fn from(e: regex::Error) -> Self {
        Self::Regex { message: e.to_string() }
    }
}

impl ShipflowError {
    /// Create a tool not found error with installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "docker" => "Install Docker: https://docs.docker.com/get-docker/".to_string(),
            "podman" => "Install Podman: https://podman.io/docs/installation".to_string(),
            _ => format!("Install {} and ensure it's in your PATH", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }

    /// Create a backend error, deriving a remediation hint from the tool output
    pub fn backend(operation: BackendOperation, stderr: &str) -> Self {
        let help = RecoverySuggestion::for_backend(operation, stderr).map(|s| s.to_string());
        let message = stderr.trim();

        Self::Backend {
            operation,
            message: if message.is_empty() {
                "command exited with a non-zero status".to_string()
            } else {
                message.to_string()
            },
            help,
        }
    }

    /// Whether this error is a configuration problem detected before any stage ran
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ActionNotFound { .. }
                | Self::InvalidPipeline { .. }
                | Self::UnknownPipeline { .. }
                | Self::PipelineNotFound { .. }
        )
    }
}
