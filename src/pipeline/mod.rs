// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline definitions and execution
//!
//! A [`ProjectConfig`] is parsed from `.shipflow.yaml`, one of its pipelines
//! is resolved into a [`PipelinePlan`], and a [`PipelineDriver`] runs the
//! plan's stages over an immutable [`PipelineContext`].

mod context;
mod definition;
mod driver;
mod plan;
mod validation;

pub use context::PipelineContext;
pub use definition::*;
pub use driver::{PipelineDriver, PipelineOutcome};
pub use plan::PipelinePlan;
pub use validation::{PipelineValidator, ValidationResult};
