// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Env command - drive a declared stack by hand

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::time::Duration;

use super::{config_path, find_stack, EnvAction, Tooling};
use crate::environment::{EnvironmentLifecycle, EnvironmentState, LogOptions, ServiceStatus};
use crate::pipeline::ProjectConfig;
use crate::utils::{create_spinner, print_header, print_success};

/// Run the env command
pub async fn run(
    action: EnvAction,
    file: Option<PathBuf>,
    docker: Option<String>,
    _verbose: bool,
) -> Result<()> {
    let path = config_path(file)?;
    let config = ProjectConfig::from_file(&path)?;
    let tooling = Tooling::from_settings(&config.settings, docker);
    tooling.check_available()?;
    let environment = &tooling.environment;

    match action {
        EnvAction::Up {
            stack,
            wait,
            state,
            timeout,
            interval,
        } => {
            let descriptor = find_stack(&config, &stack)?;

            let spinner = create_spinner(&format!("Starting {}...", descriptor.project));
            let started = environment.up(descriptor).await;
            spinner.finish_and_clear();
            let mut current = started?;
            print_success(&format!("stack '{}' started", stack));

            if !wait.is_empty() {
                let spinner = create_spinner(&format!("Waiting for {} to be {}...", wait.join(", "), state));
                let waited = environment
                    .wait_for(
                        descriptor,
                        &wait,
                        state,
                        Duration::from_secs(timeout),
                        Duration::from_secs(interval),
                    )
                    .await;
                spinner.finish_and_clear();
                current = waited?;
                print_success(&format!("{} {}", wait.join(", "), state));
            }

            println!();
            print_state(&current);
            Ok(())
        }

        EnvAction::Down { stack } => {
            let descriptor = find_stack(&config, &stack)?;
            environment.down(descriptor).await?;
            print_success(&format!("stack '{}' stopped", stack));
            Ok(())
        }

        EnvAction::Ps { stack } => {
            let descriptor = find_stack(&config, &stack)?;
            let current = environment.status(descriptor).await?;
            print_state(&current);
            Ok(())
        }

        EnvAction::Logs {
            stack,
            services,
            tail,
        } => {
            let descriptor = find_stack(&config, &stack)?;
            let logs = environment
                .capture_logs(descriptor, &LogOptions { services, tail })
                .await?;
            print!("{}", logs);
            Ok(())
        }
    }
}

fn print_state(state: &EnvironmentState) {
    print_header(&format!("Project: {}", state.project));

    if state.services.is_empty() {
        println!("{}", "  No services running.".dimmed());
        return;
    }

    for (name, info) in &state.services {
        let label = format!("{:<12}", info.status.to_string());
        let status = match info.status {
            ServiceStatus::Healthy => label.green(),
            ServiceStatus::Running => label.cyan(),
            ServiceStatus::Restarting => label.yellow(),
            ServiceStatus::Stopped | ServiceStatus::Unknown => label.red(),
        };

        let ports = info
            .ports
            .iter()
            .map(|p| format!("{}->{}/{}", p.host_port, p.container_port, p.protocol))
            .collect::<Vec<_>>()
            .join(", ");

        println!("  {:<20} {} {}", name, status, ports.dimmed());
    }
}
