// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Filesystem-based plan cache
//!
//! Stores one JSON file per plan, sharded by the first two characters of the
//! fingerprint.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use super::{Cache, CacheStats, CachedEntry};
use crate::errors::ShipflowError;
use crate::pipeline::PipelinePlan;

/// Filesystem-based cache
pub struct FilesystemCache {
    cache_dir: PathBuf,
}

fn cache_error(action: &str, e: impl std::fmt::Display) -> ShipflowError {
    ShipflowError::CacheError {
        message: format!("Failed to {}: {}", action, e),
    }
}

impl FilesystemCache {
    /// Create a new filesystem cache
    pub fn new(cache_dir: PathBuf) -> Result<Self, ShipflowError> {
        if !cache_dir.exists() {
            std::fs::create_dir_all(&cache_dir)
                .map_err(|e| cache_error("create cache directory", e))?;
        }

        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get path for a cache entry
    fn cache_path(&self, key: &str) -> PathBuf {
        let (prefix, rest) = key.split_at(2.min(key.len()));
        self.cache_dir.join(prefix).join(format!("{}.json", rest))
    }

    /// List all cache entries; unreadable ones are ignored
    fn list_entries(&self) -> Result<Vec<CachedEntry>, ShipflowError> {
        let mut entries = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(entries);
        }

        for prefix_dir in
            std::fs::read_dir(&self.cache_dir).map_err(|e| cache_error("read cache directory", e))?
        {
            let prefix_dir = prefix_dir
                .map_err(|e| cache_error("read cache entry", e))?
                .path();

            if !prefix_dir.is_dir() {
                continue;
            }

            for entry_file in
                std::fs::read_dir(&prefix_dir).map_err(|e| cache_error("read cache subdirectory", e))?
            {
                let entry_file = entry_file
                    .map_err(|e| cache_error("read cache file", e))?
                    .path();

                if entry_file.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                if let Ok(content) = std::fs::read_to_string(&entry_file) {
                    if let Ok(entry) = serde_json::from_str::<CachedEntry>(&content) {
                        entries.push(entry);
                    }
                }
            }
        }

        Ok(entries)
    }

    /// Calculate directory size recursively
    fn dir_size(path: &Path) -> Result<u64, ShipflowError> {
        let mut size = 0;

        for entry in std::fs::read_dir(path).map_err(|e| cache_error("read directory", e))? {
            let entry = entry.map_err(|e| cache_error("read entry", e))?;

            let path = entry.path();
            if path.is_dir() {
                size += Self::dir_size(&path)?;
            } else {
                size += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        Ok(size)
    }
}

#[async_trait]
impl Cache for FilesystemCache {
    async fn get(&self, fingerprint: &str) -> Result<Option<PipelinePlan>, ShipflowError> {
        let path = self.cache_path(fingerprint);

        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| cache_error("read cache entry", e))?;

        // A corrupt or outdated entry is a miss, not an error.
        let entry: CachedEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable cache entry");
                let _ = tokio::fs::remove_file(&path).await;
                return Ok(None);
            }
        };

        if entry.version != crate::VERSION || entry.plan.fingerprint != fingerprint {
            debug!(path = %path.display(), "discarding stale cache entry");
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(entry.plan))
    }

    async fn store(&self, plan: &PipelinePlan) -> Result<(), ShipflowError> {
        if plan.fingerprint.is_empty() {
            return Err(ShipflowError::CacheError {
                message: "Refusing to cache a plan without a fingerprint".to_string(),
            });
        }

        let path = self.cache_path(&plan.fingerprint);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| cache_error("create cache directory", e))?;
        }

        let entry = CachedEntry {
            timestamp: SystemTime::now(),
            pipeline: plan.pipeline.name.clone(),
            version: crate::VERSION.to_string(),
            plan: plan.clone(),
        };

        let json =
            serde_json::to_string_pretty(&entry).map_err(|e| cache_error("serialize cache entry", e))?;

        tokio::fs::write(&path, json)
            .await
            .map_err(|e| cache_error("write cache entry", e))?;

        Ok(())
    }

    async fn invalidate(&self, fingerprint: &str) -> Result<(), ShipflowError> {
        let path = self.cache_path(fingerprint);

        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| cache_error("remove cache entry", e))?;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<(), ShipflowError> {
        if self.cache_dir.exists() {
            tokio::fs::remove_dir_all(&self.cache_dir)
                .await
                .map_err(|e| cache_error("clear cache", e))?;

            tokio::fs::create_dir_all(&self.cache_dir)
                .await
                .map_err(|e| cache_error("recreate cache directory", e))?;
        }

        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, ShipflowError> {
        let entries = self.list_entries()?;

        let mut stats = CacheStats {
            entries: entries.len(),
            oldest_entry: entries.iter().map(|e| e.timestamp).min(),
            newest_entry: entries.iter().map(|e| e.timestamp).max(),
            ..Default::default()
        };

        if self.cache_dir.exists() {
            stats.size_bytes = Self::dir_size(&self.cache_dir)?;
        }

        Ok(stats)
    }
}
