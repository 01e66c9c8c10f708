//! Git client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::PushBackoff;

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Settings shared by every mirror operation.
#[derive(Debug, Clone)]
pub struct GitClientConfig {
    /// Root directory holding all local clones.
    repositories_path: PathBuf,

    /// Bound for every clone, fetch and push attempt.
    timeout: Duration,

    /// SSH private key used for `ssh` transports (optional).
    private_key: Option<PathBuf>,

    /// SSH private key passphrase (optional).
    passphrase: Option<String>,

    /// Retry policy for pushes.
    push_backoff: PushBackoff,
}

impl GitClientConfig {
    /// Creates a new builder for GitClientConfig.
    pub fn builder() -> GitClientConfigBuilder {
        GitClientConfigBuilder::default()
    }

    /// Returns the root directory of the local clones.
    pub fn repositories_path(&self) -> &Path {
        &self.repositories_path
    }

    /// Returns the per-operation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the SSH private key path.
    pub fn private_key(&self) -> Option<&Path> {
        self.private_key.as_deref()
    }

    /// Returns the SSH private key passphrase.
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    /// Returns the push retry policy.
    pub fn push_backoff(&self) -> &PushBackoff {
        &self.push_backoff
    }
}

/// Builder for GitClientConfig.
#[derive(Debug, Default)]
pub struct GitClientConfigBuilder {
    repositories_path: Option<PathBuf>,
    timeout: Option<Duration>,
    private_key: Option<PathBuf>,
    passphrase: Option<String>,
    push_backoff: Option<PushBackoff>,
}

impl GitClientConfigBuilder {
    /// Sets the root directory for local clones.
    pub fn repositories_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repositories_path = Some(path.into());
        self
    }

    /// Sets the per-operation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets SSH authentication.
    pub fn ssh_key(mut self, private_key: impl Into<PathBuf>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    /// Sets the SSH key passphrase.
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Sets the push retry policy.
    pub fn push_backoff(mut self, backoff: PushBackoff) -> Self {
        self.push_backoff = Some(backoff);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or the timeout is zero.
    pub fn build(self) -> Result<GitClientConfig, &'static str> {
        let repositories_path = self
            .repositories_path
            .ok_or("repositories_path is required")?;
        let timeout = self.timeout.unwrap_or_else(default_timeout);
        if timeout.is_zero() {
            return Err("timeout must be greater than zero");
        }

        Ok(GitClientConfig {
            repositories_path,
            timeout,
            private_key: self.private_key,
            passphrase: self.passphrase.filter(|p| !p.is_empty()),
            push_backoff: self.push_backoff.unwrap_or_default(),
        })
    }
}
