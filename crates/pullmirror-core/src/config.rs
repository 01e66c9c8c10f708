//! Mirrors configuration file.
//!
//! ```yaml
//! repositories:
//!   - origin: https://github.com/yakshaving-art/git-pull-mirror.git
//!     target: git@gitlab.com:yakshaving.art/git-pull-mirror.git
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::url::GitUrl;

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    repositories: Option<Vec<RawRepository>>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    origin: String,
    target: String,
}

/// One origin/target pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    origin: GitUrl,
    target: GitUrl,
}

impl RepositoryConfig {
    /// Creates a pair from already parsed descriptors.
    pub fn new(origin: GitUrl, target: GitUrl) -> Self {
        Self { origin, target }
    }

    /// Parses both URLs.
    pub fn parse(origin: &str, target: &str) -> Result<Self, ConfigError> {
        let origin_url = GitUrl::parse(origin).map_err(|source| ConfigError::InvalidOrigin {
            uri: origin.to_string(),
            source,
        })?;
        let target_url = GitUrl::parse(target).map_err(|source| ConfigError::InvalidTarget {
            uri: target.to_string(),
            source,
        })?;

        Ok(Self::new(origin_url, target_url))
    }

    /// Returns the repository being mirrored from.
    pub fn origin(&self) -> &GitUrl {
        &self.origin
    }

    /// Returns the repository being mirrored to.
    pub fn target(&self) -> &GitUrl {
        &self.target
    }
}

/// The full list of mirrored repositories.
///
/// Immutable once loaded; a reload produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorConfig {
    repositories: Vec<RepositoryConfig>,
}

impl MirrorConfig {
    /// Creates a configuration from parsed pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateOrigin`] if two origins share a
    /// provider key.
    pub fn new(repositories: Vec<RepositoryConfig>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(repositories.len());
        for repository in &repositories {
            let key = repository.origin().to_key();
            if !seen.insert(key.clone()) {
                return Err(ConfigError::DuplicateOrigin { key });
            }
        }

        Ok(Self { repositories })
    }

    /// Returns an empty configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the mirrors file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("reading configuration file {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&content, &path.display().to_string())
    }

    /// Parses a mirrors document. `source_name` is only used in errors.
    pub fn from_yaml_str(content: &str, source_name: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::empty());
        }

        let raw: Option<RawConfig> = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::parse(source_name, e.to_string()))?;

        let repositories = raw
            .and_then(|raw| raw.repositories)
            .unwrap_or_default()
            .iter()
            .map(|repo| RepositoryConfig::parse(&repo.origin, &repo.target))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(repositories)
    }

    /// Returns the configured pairs, in file order.
    pub fn repositories(&self) -> &[RepositoryConfig] {
        &self.repositories
    }

    /// Returns the number of configured pairs.
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    /// Returns true if nothing is configured.
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
