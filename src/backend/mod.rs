// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Image backend
//!
//! The narrow interface the pipeline uses to build, tag, export and publish
//! images. The orchestration code only depends on [`ImageBackend`]; the
//! Docker CLI implementation lives in [`docker`].

mod docker;
mod reference;

pub use docker::DockerCliBackend;
pub use reference::{is_valid_tag, ImageRef, DEFAULT_TAG};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::ShipflowResult;

/// The backend operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendOperation {
    Build,
    Tag,
    Save,
    Push,
    Pull,
    Exists,
    Remove,
}

impl fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Tag => write!(f, "tag"),
            Self::Save => write!(f, "save"),
            Self::Push => write!(f, "push"),
            Self::Pull => write!(f, "pull"),
            Self::Exists => write!(f, "exists"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// The output of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Backend-assigned identifier (image id)
    pub id: String,

    /// Primary reference the image was built as
    pub image: ImageRef,

    /// Every tag known to point at this artifact
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ArtifactRef {
    pub fn new(id: impl Into<String>, image: ImageRef) -> Self {
        let tags = vec![image.tag.clone()];
        Self {
            id: id.into(),
            image,
            tags,
        }
    }
}

/// Everything the backend needs to build an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub image: ImageRef,
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    pub build_args: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub target: Option<String>,
    pub pull: bool,
    pub no_cache: bool,
}

impl BuildRequest {
    pub fn new(image: ImageRef, context: impl Into<PathBuf>) -> Self {
        Self {
            image,
            context: context.into(),
            dockerfile: None,
            build_args: BTreeMap::new(),
            labels: BTreeMap::new(),
            target: None,
            pull: false,
            no_cache: false,
        }
    }
}

/// Compression applied to exported archives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// Compressor program, if any
    pub fn program(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gzip"),
            Self::Bzip2 => Some("bzip2"),
            Self::Xz => Some("xz"),
        }
    }

    /// Conventional archive file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "tar",
            Self::Gzip => "tar.gz",
            Self::Bzip2 => "tar.bz2",
            Self::Xz => "tar.xz",
        }
    }
}

/// Registry credentials, resolved just before use
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    /// Server to log in to; defaults to the image's registry
    pub server: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// Container image operations
///
/// Each call is awaited to completion by the pipeline before the next one is
/// issued.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Build an image
    async fn build(&self, request: &BuildRequest) -> ShipflowResult<ArtifactRef>;

    /// Point every target reference at the source image
    async fn tag(&self, source: &ImageRef, targets: &[ImageRef]) -> ShipflowResult<()>;

    /// Export an image to an archive
    async fn save(
        &self,
        image: &ImageRef,
        output: &Path,
        compression: Compression,
    ) -> ShipflowResult<()>;

    /// Push an image to its registry
    async fn push(&self, image: &ImageRef, auth: Option<&AuthConfig>) -> ShipflowResult<()>;

    /// Pull an image from its registry
    async fn pull(&self, image: &ImageRef, auth: Option<&AuthConfig>) -> ShipflowResult<()>;

    /// Whether the image exists locally
    async fn exists(&self, image: &ImageRef) -> ShipflowResult<bool>;

    /// Remove a local image reference
    async fn remove(&self, image: &ImageRef) -> ShipflowResult<()>;
}
