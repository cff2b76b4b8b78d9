// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Validate command - check the configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::config_path;
use crate::pipeline::{PipelineValidator, ProjectConfig};

/// Run the validate command
pub async fn run(file: Option<PathBuf>, verbose: bool) -> Result<()> {
    println!("{}", "Validating configuration...".bold());
    println!();

    let path = config_path(file)?;
    let config = match ProjectConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("  {} Failed to load {}", "✗".red(), path.display());
            eprintln!();
            return Err(e.into());
        }
    };

    println!("  {} {} parsed", "✓".green(), path.display());

    let validation = PipelineValidator::validate_config(&config);

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !validation.missing_actions.is_empty() {
        let declared = config.catalog().names();
        println!();
        println!("{}:", "Declared actions".dimmed());
        println!("  {}", declared.join(", ").dimmed());
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Summary".bold());
        println!("  Images:     {}", config.images.len());
        println!("  Stacks:     {}", config.stacks.len());
        println!("  Registries: {}", config.registries.len());
        println!("  Actions:    {}", config.actions.len());
        println!("  Pipelines:  {}", config.pipeline_names().join(", "));
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Configuration validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Configuration is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Configuration is valid!".green().bold());
    }
    Ok(())
}
