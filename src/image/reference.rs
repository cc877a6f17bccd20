//! Container image reference parsing
//!
//! Index images handed back by IIB are always fully qualified
//! (`<registry>/<namespace>/<name>:<tag>` or `...@sha256:<hex>`), so the
//! first path component is taken as the registry without guessing.

use crate::error::{IibPushError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self> {
        let (registry, path) = reference.split_once('/').ok_or_else(|| {
            IibPushError::Parse(format!(
                "Image reference '{}' has no registry component",
                reference
            ))
        })?;

        if registry.is_empty() || path.is_empty() {
            return Err(IibPushError::Parse(format!(
                "Invalid image reference: '{}'",
                reference
            )));
        }

        let (path, digest) = match path.split_once('@') {
            Some((p, d)) => (p, Some(d.to_string())),
            None => (path, None),
        };

        let (repository, tag) = match path.rsplit_once(':') {
            // a ':' before the last '/' would belong to a port, not a tag
            Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag.to_string())),
            _ => (path, None),
        };

        if repository.is_empty() || tag.as_deref() == Some("") {
            return Err(IibPushError::Parse(format!(
                "Invalid image reference: '{}'",
                reference
            )));
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    /// `https://<registry>`, the feed Pulp syncs from
    pub fn feed_url(&self) -> String {
        format!("https://{}", self.registry)
    }

    /// Tag if present, otherwise `latest`
    pub fn tag_or_latest(&self) -> &str {
        self.tag.as_deref().unwrap_or("latest")
    }
}

/// Whether a repository string already names a tag or digest.
///
/// Works on partial references such as `namespace/repo` as well.
pub fn has_tag_or_digest(repository: &str) -> bool {
    let last = repository.rsplit('/').next().unwrap_or(repository);
    last.contains(':') || last.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_reference() {
        let r = ImageReference::parse("feed.com/index/image:tag").unwrap();
        assert_eq!(r.registry, "feed.com");
        assert_eq!(r.repository, "index/image");
        assert_eq!(r.tag.as_deref(), Some("tag"));
        assert_eq!(r.digest, None);
        assert_eq!(r.feed_url(), "https://feed.com");
    }

    #[test]
    fn test_parse_registry_with_port_and_digest() {
        let r = ImageReference::parse("registry:5000/ns/iib@sha256:abcd").unwrap();
        assert_eq!(r.registry, "registry:5000");
        assert_eq!(r.repository, "ns/iib");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest.as_deref(), Some("sha256:abcd"));
        assert_eq!(r.tag_or_latest(), "latest");
    }

    #[test]
    fn test_parse_rejects_missing_registry() {
        assert!(ImageReference::parse("image:tag").is_err());
        assert!(ImageReference::parse("feed.com/").is_err());
        assert!(ImageReference::parse("feed.com/image:").is_err());
    }

    #[test]
    fn test_has_tag_or_digest() {
        assert!(has_tag_or_digest("some-repo:1"));
        assert!(has_tag_or_digest("quay.io/ns/repo@sha256:aa"));
        assert!(!has_tag_or_digest("some-repo"));
        assert!(!has_tag_or_digest("localhost:5000/ns/repo"));
    }
}
