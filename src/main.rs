// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! shipflow - Container Image Pipelines
//!
//! Build, test and release container images.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shipflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Run {
            pipeline,
            file,
            no_cache,
            dry_run,
        } => {
            shipflow::cli::run::run(pipeline, file, no_cache, dry_run, cli.docker, cli.verbose)
                .await
        }
        Commands::Validate { file } => shipflow::cli::validate::run(file, cli.verbose).await,
        Commands::List { file } => shipflow::cli::list::run(file, cli.verbose).await,
        Commands::Env { action, file } => {
            shipflow::cli::env::run(action, file, cli.docker, cli.verbose).await
        }
        Commands::Cache { action } => shipflow::cli::cache::run(action, cli.verbose).await,
    }
}
