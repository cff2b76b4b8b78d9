// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Content hashing for cache keys
//!
//! Uses BLAKE3 for fast, secure content hashing.

use blake3::Hasher;
use std::path::Path;

use crate::errors::{ShipflowError, ShipflowResult};

/// Content hasher for generating cache keys
pub struct ContentHasher {
    hasher: Hasher,
}

impl ContentHasher {
    /// Create a new content hasher
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Fingerprint of a pipeline plan
    ///
    /// Covers the config bytes, the pipeline name and the crate version, so a
    /// plan resolved by an older shipflow is never replayed.
    pub fn plan_fingerprint(config: &Path, pipeline: &str) -> ShipflowResult<String> {
        let mut hasher = Self::new();
        hasher.update(crate::VERSION.as_bytes());
        hasher.update(&[0]);
        hasher.update(pipeline.as_bytes());
        hasher.update(&[0]);
        hasher.hash_file(config)?;
        Ok(hasher.finalize())
    }

    /// Hash a single file's contents
    pub fn hash_file(&mut self, path: &Path) -> ShipflowResult<()> {
        let content = std::fs::read(path).map_err(|e| ShipflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        self.hasher.update(&content);
        Ok(())
    }

    /// Hash arbitrary bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Finalize and get the hash
    pub fn finalize(self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}
