// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Caching layer for resolved pipeline plans
//!
//! Provides file-based caching so an unchanged config is not re-resolved and
//! re-validated on every run.

mod filesystem;
mod hash;

pub use filesystem::FilesystemCache;
pub use hash::ContentHasher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::errors::ShipflowError;
use crate::pipeline::PipelinePlan;

/// Trait for cache implementations
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get the cached plan for a fingerprint
    async fn get(&self, fingerprint: &str) -> Result<Option<PipelinePlan>, ShipflowError>;

    /// Store a plan under its fingerprint
    async fn store(&self, plan: &PipelinePlan) -> Result<(), ShipflowError>;

    /// Invalidate the plan for a fingerprint
    async fn invalidate(&self, fingerprint: &str) -> Result<(), ShipflowError>;

    /// Clear all cached plans
    async fn clear(&self) -> Result<(), ShipflowError>;

    /// Get cache statistics
    async fn stats(&self) -> Result<CacheStats, ShipflowError>;
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: usize,
    /// Total size in bytes
    pub size_bytes: u64,
    /// Oldest entry timestamp
    pub oldest_entry: Option<SystemTime>,
    /// Newest entry timestamp
    pub newest_entry: Option<SystemTime>,
}

impl CacheStats {
    /// Format size for display
    pub fn formatted_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if self.size_bytes >= GB {
            format!("{:.2} GB", self.size_bytes as f64 / GB as f64)
        } else if self.size_bytes >= MB {
            format!("{:.2} MB", self.size_bytes as f64 / MB as f64)
        } else if self.size_bytes >= KB {
            format!("{:.2} KB", self.size_bytes as f64 / KB as f64)
        } else {
            format!("{} bytes", self.size_bytes)
        }
    }
}

/// Cached plan entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    /// When the entry was cached
    pub timestamp: SystemTime,
    /// Pipeline name
    pub pipeline: String,
    /// Shipflow version that resolved the plan
    pub version: String,
    /// The resolved plan
    pub plan: PipelinePlan,
}
