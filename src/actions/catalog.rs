// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Serializable action catalog
//!
//! The catalog is plain data. [`CatalogLookup::from_catalog`] turns it into
//! live actions once the runtime services exist.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{Action, ActionLookup, BuildAction, CommandAction};
use crate::backend::ImageBackend;
use crate::pipeline::ImageSpec;
use crate::process::CommandRunner;

/// Prefix of the action every declared image gets implicitly
pub const BUILD_ACTION_PREFIX: &str = "build:";

/// Name of the implicit build action for an image
pub fn build_action_name(image: &str) -> String {
    format!("{BUILD_ACTION_PREFIX}{image}")
}

/// Definition of a named action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionDefinition {
    /// Shell command
    Command {
        command: String,

        #[serde(default = "default_shell")]
        shell: String,

        #[serde(default)]
        working_dir: Option<PathBuf>,

        #[serde(default)]
        env: BTreeMap<String, String>,

        /// Falls back to the project's command timeout
        #[serde(default)]
        timeout_secs: Option<u64>,
    },

    /// Build of a declared image
    Build { image: String },
}

fn default_shell() -> String {
    "sh".to_string()
}

/// Images and named actions, as declared in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCatalog {
    #[serde(default)]
    pub images: BTreeMap<String, ImageSpec>,

    #[serde(default)]
    pub actions: BTreeMap<String, ActionDefinition>,

    /// Timeout for command actions without their own
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    crate::process::DEFAULT_COMMAND_TIMEOUT.as_secs()
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self::new(BTreeMap::new(), BTreeMap::new(), default_timeout_secs())
    }
}

impl ActionCatalog {
    pub fn new(
        images: BTreeMap<String, ImageSpec>,
        actions: BTreeMap<String, ActionDefinition>,
        command_timeout_secs: u64,
    ) -> Self {
        Self {
            images,
            actions,
            command_timeout_secs,
        }
    }

    /// Whether `name` resolves to an action
    pub fn contains(&self, name: &str) -> bool {
        if self.actions.contains_key(name) {
            return true;
        }
        name.strip_prefix(BUILD_ACTION_PREFIX)
            .is_some_and(|image| self.images.contains_key(image))
    }

    /// Every resolvable action name, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .images
            .keys()
            .map(|image| build_action_name(image))
            .chain(self.actions.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Live services actions are bound to
#[derive(Clone)]
pub struct ActionServices {
    pub runner: Arc<dyn CommandRunner>,
    pub backend: Arc<dyn ImageBackend>,
}

/// Action lookup rebuilt from an [`ActionCatalog`]
pub struct CatalogLookup {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl CatalogLookup {
    /// Bind every catalog entry to the live services
    ///
    /// Explicit actions shadow implicit `build:<image>` ones of the same name.
    pub fn from_catalog(catalog: &ActionCatalog, services: ActionServices) -> Self {
        let mut actions: HashMap<String, Arc<dyn Action>> = HashMap::new();

        for (image, spec) in &catalog.images {
            let name = build_action_name(image);
            let action = BuildAction::new(name.clone(), spec.clone(), services.backend.clone());
            actions.insert(name, Arc::new(action));
        }

        for (name, definition) in &catalog.actions {
            let action: Arc<dyn Action> = match definition {
                ActionDefinition::Command {
                    command,
                    shell,
                    working_dir,
                    env,
                    timeout_secs,
                } => {
                    let timeout = timeout_secs.unwrap_or(catalog.command_timeout_secs);
                    Arc::new(
                        CommandAction::new(name.clone(), command.clone(), services.runner.clone())
                            .shell(shell.clone())
                            .working_dir(working_dir.clone())
                            .env(env.clone())
                            .timeout(Duration::from_secs(timeout)),
                    )
                }
                ActionDefinition::Build { image } => match catalog.images.get(image) {
                    Some(spec) => Arc::new(BuildAction::new(
                        name.clone(),
                        spec.clone(),
                        services.backend.clone(),
                    )),
                    None => {
                        warn!(action = %name, image = %image, "build action references an undeclared image");
                        continue;
                    }
                },
            };
            actions.insert(name.clone(), action);
        }

        Self { actions }
    }
}

impl ActionLookup for CatalogLookup {
    fn find(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }
}
