// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Error recovery suggestions
//!
//! Maps raw container tool output to actionable suggestions.

use crate::backend::BackendOperation;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest a fix for a failed backend operation, based on its stderr
    pub fn for_backend(operation: BackendOperation, stderr: &str) -> Option<Self> {
        let lower = stderr.to_lowercase();

        if lower.contains("cannot connect to the docker daemon")
            || lower.contains("is the docker daemon running")
        {
            return Some(Self::start_daemon());
        }

        match operation {
            BackendOperation::Push | BackendOperation::Pull
                if lower.contains("denied")
                    || lower.contains("unauthorized")
                    || lower.contains("authentication required") =>
            {
                Some(Self::check_credentials())
            }
            BackendOperation::Pull | BackendOperation::Tag | BackendOperation::Save
                if lower.contains("no such image") || lower.contains("not found") =>
            {
                Some(Self {
                    action: "Make sure the source image exists locally".into(),
                    steps: vec![
                        "The referenced image could not be found".into(),
                        "Build it first or check the repository and tag".into(),
                    ],
                    commands: vec!["docker image ls".into()],
                })
            }
            BackendOperation::Build if lower.contains("dockerfile") => Some(Self {
                action: "Check the Dockerfile location".into(),
                steps: vec![
                    "The build could not read its Dockerfile".into(),
                    "Set 'dockerfile' and 'context' on the image declaration".into(),
                ],
                commands: vec![],
            }),
            BackendOperation::Save if lower.contains("no space left") => Some(Self {
                action: "Free disk space for the archive".into(),
                steps: vec!["The archive destination ran out of space".into()],
                commands: vec!["df -h".into()],
            }),
            _ => None,
        }
    }

    fn start_daemon() -> Self {
        Self {
            action: "Start the Docker daemon".into(),
            steps: vec!["The docker CLI could not reach its daemon".into()],
            commands: vec!["# On systemd hosts:".into(), "sudo systemctl start docker".into()],
        }
    }

    fn check_credentials() -> Self {
        Self {
            action: "Check registry credentials".into(),
            steps: vec![
                "The registry rejected the request".into(),
                "Configure 'auth' on the registry or log in manually".into(),
            ],
            commands: vec!["docker login <registry>".into()],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
