// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! List command - show declared pipelines

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::config_path;
use crate::pipeline::{PipelineSpec, ProjectConfig};
use crate::utils::print_header;

/// Run the list command
pub async fn run(file: Option<PathBuf>, verbose: bool) -> Result<()> {
    let path = config_path(file)?;
    let config = ProjectConfig::from_file(&path)?;

    print_header("Pipelines");

    if config.pipelines.is_empty() {
        println!("{}", "  No pipelines declared.".dimmed());
        return Ok(());
    }

    for pipeline in &config.pipelines {
        match pipeline.description {
            Some(ref description) => {
                println!("  {}  {}", pipeline.name.cyan().bold(), description.dimmed())
            }
            None => println!("  {}", pipeline.name.cyan().bold()),
        }
        println!("    {}", stage_summary(pipeline));

        if verbose {
            for (action, context) in pipeline.referenced_actions() {
                println!("    {} {}", "·".dimmed(), format!("{} ({})", action, context).dimmed());
            }
        }
    }

    Ok(())
}

/// One-line view of the stages a pipeline declares
fn stage_summary(pipeline: &PipelineSpec) -> String {
    let mut stages = vec![format!("build {}", pipeline.build.image)];
    if let Some(ref test) = pipeline.test {
        stages.push(format!("test@{}", test.stack));
    }
    if pipeline.on_success.is_some() {
        stages.push("on_success".to_string());
    }
    if pipeline.on_failure.is_some() {
        stages.push("on_failure".to_string());
    }
    if pipeline.always.is_some() {
        stages.push("always".to_string());
    }
    stages.join(" → ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::SAMPLE_CONFIG;

    #[test]
    fn test_stage_summary() {
        let config = ProjectConfig::from_yaml(SAMPLE_CONFIG).unwrap();
        let summary = stage_summary(config.pipeline("release").unwrap());
        assert!(summary.starts_with("build "));
        assert!(summary.contains("test@it"));
    }
}
