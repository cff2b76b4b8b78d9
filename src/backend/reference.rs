// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Image references
//!
//! `[registry/][namespace/]repository[:tag]`, split into components so
//! tags and registries can be swapped independently.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ShipflowError, ShipflowResult};

/// Tag used when a reference does not name one
pub const DEFAULT_TAG: &str = "latest";

/// A fully qualified image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    /// Registry host (with optional port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Namespace / organisation path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Repository name
    pub repository: String,

    /// Tag
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            registry: None,
            namespace: None,
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// Parse a reference string
    pub fn parse(reference: &str) -> ShipflowResult<Self> {
        let invalid = |reason: &str| ShipflowError::InvalidReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let reference = reference.trim();
        if reference.is_empty() {
            return Err(invalid("reference is empty"));
        }
        if reference.contains('@') {
            return Err(invalid("digest references are not supported"));
        }

        // The tag separator is the last ':' after the last '/', so
        // "localhost:5000/app" has no tag.
        let last_slash = reference.rfind('/');
        let (name, tag) = match reference.rfind(':') {
            Some(colon) if last_slash.map_or(true, |slash| colon > slash) => {
                (&reference[..colon], &reference[colon + 1..])
            }
            _ => (reference, DEFAULT_TAG),
        };

        if tag.is_empty() {
            return Err(invalid("tag is empty"));
        }

        let mut parts: Vec<&str> = name.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty path component"));
        }

        let registry = if parts.len() > 1 && is_registry_host(parts[0]) {
            Some(parts.remove(0).to_string())
        } else {
            None
        };

        let repository = parts.pop().map(str::to_string).ok_or_else(|| invalid("missing repository"))?;
        let namespace = if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        };

        Ok(Self {
            registry,
            namespace,
            repository,
            tag: tag.to_string(),
        })
    }

    /// Same image, different tag
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..self.clone()
        }
    }

    /// Same repository under another registry/namespace
    ///
    /// A `None` namespace keeps the current one.
    pub fn retarget(&self, registry: Option<&str>, namespace: Option<&str>, tag: &str) -> Self {
        Self {
            registry: registry.map(str::to_string),
            namespace: namespace
                .map(str::to_string)
                .or_else(|| self.namespace.clone()),
            repository: self.repository.clone(),
            tag: tag.to_string(),
        }
    }

    /// Reference without the tag
    pub fn name(&self) -> String {
        let mut name = String::new();
        if let Some(ref registry) = self.registry {
            name.push_str(registry);
            name.push('/');
        }
        if let Some(ref namespace) = self.namespace {
            name.push_str(namespace);
            name.push('/');
        }
        name.push_str(&self.repository);
        name
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name(), self.tag)
    }
}

fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

/// Whether `tag` is a valid image tag
pub fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    tag.len() <= 128 && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_reference() {
        let image = ImageRef::parse("registry.example.com/team/app:1.2").unwrap();
        assert_eq!(image.registry.as_deref(), Some("registry.example.com"));
        assert_eq!(image.namespace.as_deref(), Some("team"));
        assert_eq!(image.repository, "app");
        assert_eq!(image.tag, "1.2");
        assert_eq!(image.to_string(), "registry.example.com/team/app:1.2");
    }

    #[test]
    fn test_parse_registry_with_port_without_tag() {
        let image = ImageRef::parse("localhost:5000/app").unwrap();
        assert_eq!(image.registry.as_deref(), Some("localhost:5000"));
        assert_eq!(image.namespace, None);
        assert_eq!(image.tag, DEFAULT_TAG);
    }

    #[test]
    fn test_parse_hub_namespace() {
        let image = ImageRef::parse("library/redis:7").unwrap();
        assert_eq!(image.registry, None);
        assert_eq!(image.namespace.as_deref(), Some("library"));
        assert_eq!(image.repository, "redis");
    }

    #[test]
    fn test_parse_rejects_bad_references() {
        assert!(ImageRef::parse("").is_err());
        assert!(ImageRef::parse("app:").is_err());
        assert!(ImageRef::parse("team//app").is_err());
        assert!(ImageRef::parse("app@sha256:abc").is_err());
    }

    #[test]
    fn test_retarget_keeps_namespace_by_default() {
        let image = ImageRef::parse("team/app:1").unwrap();
        let moved = image.retarget(Some("ghcr.io"), None, "2");
        assert_eq!(moved.to_string(), "ghcr.io/team/app:2");

        let moved = image.retarget(Some("ghcr.io"), Some("other"), "2");
        assert_eq!(moved.to_string(), "ghcr.io/other/app:2");
    }

    #[test]
    fn test_valid_tags() {
        assert!(is_valid_tag("1.2.3"));
        assert!(is_valid_tag("_build-7"));
        assert!(!is_valid_tag(""));
        assert!(!is_valid_tag("-leading"));
        assert!(!is_valid_tag("has space"));
        assert!(!is_valid_tag(&"a".repeat(129)));
    }
}
