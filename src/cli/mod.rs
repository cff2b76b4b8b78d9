// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for shipflow.

pub mod cache;
pub mod env;
pub mod list;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{DockerCliBackend, ImageBackend};
use crate::environment::{ComposeEnvironment, EnvironmentLifecycle, ReadinessState};
use crate::errors::{ShipflowError, ShipflowResult};
use crate::pipeline::{ProjectConfig, Settings, CONFIG_FILE_NAMES};
use crate::process::{CommandRunner, ProcessRunner};

/// Container image pipelines
///
/// Build an image, test it against a compose stack, then tag, archive and
/// publish it or mark it as failed.
#[derive(Parser, Debug)]
#[clap(
    name = "shipflow",
    version,
    about = "Build, test and release container images",
    long_about = None,
    after_help = "Examples:\n\
        shipflow list                      Show the pipelines in .shipflow.yaml\n\
        shipflow validate                  Check the configuration\n\
        shipflow run release               Run the 'release' pipeline\n\
        shipflow env up it --wait db       Start the 'it' stack and wait for db\n\n\
        See 'shipflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Container CLI to use instead of the configured one
    #[clap(long, global = true, env = "SHIPFLOW_DOCKER", value_name = "PROGRAM")]
    pub docker: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline
    Run {
        /// Pipeline name
        pipeline: String,

        /// Config file (default: .shipflow.yaml in the current directory)
        #[clap(short, long, env = "SHIPFLOW_FILE")]
        file: Option<PathBuf>,

        /// Resolve the plan again instead of using the cached one
        #[clap(long)]
        no_cache: bool,

        /// Show the plan without running it
        #[clap(long)]
        dry_run: bool,
    },

    /// Validate the configuration
    Validate {
        /// Config file
        #[clap(short, long, env = "SHIPFLOW_FILE")]
        file: Option<PathBuf>,
    },

    /// List pipelines
    List {
        /// Config file
        #[clap(short, long, env = "SHIPFLOW_FILE")]
        file: Option<PathBuf>,
    },

    /// Manage a declared stack by hand
    Env {
        #[clap(subcommand)]
        action: EnvAction,

        /// Config file
        #[clap(short, long, global = true, env = "SHIPFLOW_FILE")]
        file: Option<PathBuf>,
    },

    /// Cache management
    Cache {
        #[clap(subcommand)]
        action: CacheAction,
    },
}

/// Stack actions
#[derive(Subcommand, Debug, Clone)]
pub enum EnvAction {
    /// Start a stack
    Up {
        /// Stack name
        stack: String,

        /// Services to wait for
        #[clap(short, long)]
        wait: Vec<String>,

        /// State the services must reach
        #[clap(long, default_value = "running")]
        state: ReadinessState,

        /// Seconds to wait before giving up
        #[clap(long, default_value = "60")]
        timeout: u64,

        /// Seconds between status polls
        #[clap(long, default_value = "2")]
        interval: u64,
    },

    /// Stop a stack and remove its containers
    Down {
        /// Stack name
        stack: String,
    },

    /// Show service status
    Ps {
        /// Stack name
        stack: String,
    },

    /// Print service logs
    Logs {
        /// Stack name
        stack: String,

        /// Services (default: all)
        services: Vec<String>,

        /// Only the last N lines per service
        #[clap(long)]
        tail: Option<usize>,
    },
}

/// Cache management actions
#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Show cache statistics
    Stats {
        /// Config file
        #[clap(short, long, env = "SHIPFLOW_FILE")]
        file: Option<PathBuf>,
    },

    /// Clear the cache
    Clear {
        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,

        /// Config file
        #[clap(short, long, env = "SHIPFLOW_FILE")]
        file: Option<PathBuf>,
    },
}

/// Config path: the given one, or the first config file in the current directory
pub fn config_path(file: Option<PathBuf>) -> ShipflowResult<PathBuf> {
    if let Some(file) = file {
        return Ok(file);
    }
    let cwd = std::env::current_dir()?;
    Ok(ProjectConfig::locate(&cwd).unwrap_or_else(|| cwd.join(CONFIG_FILE_NAMES[0])))
}

/// Directory relative paths in a config are resolved against
pub fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Live collaborators built from settings
pub struct Tooling {
    pub docker: String,
    pub runner: Arc<dyn CommandRunner>,
    pub backend: Arc<dyn ImageBackend>,
    pub environment: Arc<dyn EnvironmentLifecycle>,
}

impl Tooling {
    /// Bind the docker CLI, preferring `docker_override` over the settings
    pub fn from_settings(settings: &Settings, docker_override: Option<String>) -> Self {
        let docker = docker_override.unwrap_or_else(|| settings.docker.clone());
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());

        let backend = DockerCliBackend::new(Arc::clone(&runner), docker.clone())
            .with_timeout(settings.command_timeout());

        let environment = match settings.compose {
            Some(ref compose) => ComposeEnvironment::standalone(Arc::clone(&runner), compose.clone()),
            None => ComposeEnvironment::new(Arc::clone(&runner), docker.clone()),
        }
        .with_timeout(settings.command_timeout());

        Self {
            docker,
            runner,
            backend: Arc::new(backend),
            environment: Arc::new(environment),
        }
    }

    /// Fail early when the container CLI is missing
    pub fn check_available(&self) -> ShipflowResult<()> {
        ProcessRunner::check_available(&self.docker)
    }
}

/// A declared stack, or an error naming the declared ones
pub fn find_stack<'a>(
    config: &'a ProjectConfig,
    name: &str,
) -> ShipflowResult<&'a crate::environment::StackDescriptor> {
    config
        .stacks
        .get(name)
        .ok_or_else(|| ShipflowError::InvalidPipeline {
            reason: format!("Stack '{}' is not declared", name),
            help: Some(format!(
                "Declared stacks: {}",
                config.stacks.keys().cloned().collect::<Vec<_>>().join(", ")
            )),
        })
}
