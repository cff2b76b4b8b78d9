// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! # shipflow - Container Image Pipelines
//!
//! `shipflow` builds a container image, tests it against a compose stack and
//! then either releases it or marks it as failed.
//!
//! ## Features
//!
//! - **Build** - Images are built through the container CLI or a custom action
//! - **Test** - The stack is started, awaited and always torn down
//! - **Conditional paths** - Tag, archive and publish on success; mark and
//!   keep logs on failure
//! - **Cleanup** - Runs on every exit path, including build errors
//! - **Plan caching** - Resolved plans are reused until the config changes
//!
//! ## Quick Start
//!
//! ```bash
//! # Check the configuration
//! shipflow validate
//!
//! # Show what would run
//! shipflow run release --dry-run
//!
//! # Run it
//! shipflow run release
//! ```

pub mod actions;
pub mod backend;
pub mod cache;
pub mod cli;
pub mod environment;
pub mod errors;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod stages;
pub mod utils;

#[cfg(test)]
pub(crate) mod fakes;

// Re-export commonly used types
pub use errors::{ShipflowError, ShipflowResult};
pub use pipeline::{PipelineContext, PipelineDriver, PipelineOutcome, PipelinePlan, ProjectConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
