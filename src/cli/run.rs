// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Run command - execute a pipeline

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{base_dir, config_path, Tooling};
use crate::actions::{ActionServices, CatalogLookup};
use crate::cache::{Cache, ContentHasher, FilesystemCache};
use crate::errors::ShipflowResult;
use crate::pipeline::{PipelineDriver, PipelineOutcome, PipelinePlan, ProjectConfig};
use crate::stages::Route;
use crate::utils::{create_spinner, print_error, print_header, print_info, print_section, print_success, print_warning};

/// Run a pipeline
pub async fn run(
    pipeline: String,
    file: Option<PathBuf>,
    no_cache: bool,
    dry_run: bool,
    docker: Option<String>,
    verbose: bool,
) -> Result<()> {
    let path = config_path(file)?;
    let base = base_dir(&path);

    let config = ProjectConfig::from_file(&path)?;
    let cache = if no_cache {
        None
    } else {
        open_cache(&base.join(&config.settings.cache_dir))
    };

    let fingerprint = ContentHasher::plan_fingerprint(&path, &pipeline)?;
    let (plan, cached) = load_plan(&config, &pipeline, &fingerprint, cache.as_ref()).await?;

    let tooling = Tooling::from_settings(&plan.settings, docker);
    let services = ActionServices {
        runner: Arc::clone(&tooling.runner),
        backend: Arc::clone(&tooling.backend),
    };
    let lookup = Arc::new(CatalogLookup::from_catalog(&plan.catalog, services));
    let driver = PipelineDriver::new(
        plan,
        lookup,
        Arc::clone(&tooling.backend),
        Arc::clone(&tooling.environment),
    )
    .with_base_dir(base);

    println!();
    print_header(&format!("Pipeline: {}", pipeline));
    print_plan(driver.plan());

    let warnings = driver.validate()?;
    if verbose && !warnings.is_empty() {
        print_section("Warnings");
        for warning in &warnings {
            print_warning(warning);
        }
    }

    if !cached {
        if let Some(ref cache) = cache {
            if let Err(e) = cache.store(driver.plan()).await {
                warn!(error = %e, "could not cache plan");
            }
        }
    }

    if dry_run {
        println!();
        println!("{}", "Dry run: nothing was executed.".dimmed());
        return Ok(());
    }

    tooling.check_available()?;

    let spinner = create_spinner(&format!("Running pipeline '{}'...", pipeline));
    let result = driver.run().await;
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(e) => {
            println!();
            print_error(&format!("Pipeline '{}' failed", pipeline));
            Err(e.into())
        }
    }
}

fn open_cache(dir: &Path) -> Option<FilesystemCache> {
    match FilesystemCache::new(dir.to_path_buf()) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(error = %e, "plan cache unavailable");
            None
        }
    }
}

/// The cached plan for `fingerprint`, or a freshly resolved one
async fn load_plan(
    config: &ProjectConfig,
    pipeline: &str,
    fingerprint: &str,
    cache: Option<&FilesystemCache>,
) -> ShipflowResult<(PipelinePlan, bool)> {
    if let Some(cache) = cache {
        match cache.get(fingerprint).await {
            Ok(Some(plan)) => {
                debug!(pipeline, fingerprint, "using cached plan");
                return Ok((plan, true));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read plan cache"),
        }
    }

    let plan = PipelinePlan::resolve(config, pipeline)?.with_fingerprint(fingerprint);
    Ok((plan, false))
}

fn print_plan(plan: &PipelinePlan) {
    let pipeline = &plan.pipeline;
    if let Some(ref description) = pipeline.description {
        println!("{}", description.dimmed());
    }

    let mut steps = vec![format!("build {}", pipeline.build.image)];
    match pipeline.test {
        Some(ref test) => steps.push(format!("test on stack {} with {}", test.stack, test.action)),
        None => steps.push("test (skipped)".to_string()),
    }
    if pipeline.on_success.is_some() {
        steps.push("on success".to_string());
    }
    if pipeline.on_failure.is_some() {
        steps.push("on failure".to_string());
    }
    if pipeline.always.is_some() {
        steps.push("cleanup".to_string());
    }

    for (i, step) in steps.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }

    if let Some(image) = plan.catalog.images.get(&pipeline.build.image) {
        println!("  {}", format!("image: {}", image.repository).dimmed());
    }
}

fn print_outcome(outcome: &PipelineOutcome) {
    println!();
    let context = &outcome.context;

    if let Some(artifact) = context.built_artifact() {
        print_success(&format!("built {} ({})", artifact.image, artifact.id));
    }

    match context.test_result() {
        Some(result) if result.success => print_success(&format!(
            "tests passed ({} of {})",
            result.total_count - result.failure_count,
            result.total_count
        )),
        Some(result) => print_error(&format!(
            "tests failed ({} of {} failed)",
            result.failure_count, result.total_count
        )),
        None => print_info("tests skipped"),
    }

    match outcome.route {
        Some(Route::Success) => print_info("success path ran"),
        Some(Route::Failure) => print_info("failure path ran"),
        None => {}
    }

    if !context.applied_tags().is_empty() {
        print_info(&format!("tags: {}", context.applied_tags().join(", ")));
    }
    if let Some(path) = context.metadata().get("diagnostics.path") {
        print_info(&format!("diagnostics: {}", path));
    }

    println!();
    let summary = format!(
        "Pipeline '{}' finished in {:.2}s",
        outcome.pipeline,
        outcome.duration.as_secs_f64()
    );
    match outcome.tests_passed() {
        Some(false) => println!("{}", summary.yellow()),
        _ => println!("{}", summary.green()),
    }
}
