//! Server options.

use std::path::PathBuf;
use std::time::Duration;

use pullmirror_git::GitClientConfig;

use crate::error::ServerError;

/// Default number of concurrent mirror updates.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Options for [`MirrorServer`](crate::MirrorServer).
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Timeout for every clone, fetch and push.
    pub git_timeout: Duration,
    /// Root directory of the local clones.
    pub repositories_path: PathBuf,
    /// SSH private key for `ssh` remotes.
    pub ssh_key: Option<PathBuf>,
    /// Passphrase of the SSH private key.
    pub ssh_key_passphrase: Option<String>,
    /// Do not register webhooks with the provider.
    pub skip_webhook_registration: bool,
    /// Number of workers and queue capacity.
    pub concurrency: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            git_timeout: Duration::from_secs(60),
            repositories_path: PathBuf::from("."),
            ssh_key: None,
            ssh_key_passphrase: None,
            skip_webhook_registration: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ServerOptions {
    /// Checks the options make sense before anything is started.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.git_timeout.is_zero() {
            return Err(ServerError::InvalidOptions(
                "git timeout cannot be 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ServerError::InvalidOptions(
                "concurrency cannot be 0".to_string(),
            ));
        }

        let metadata = std::fs::metadata(&self.repositories_path).map_err(|_| {
            ServerError::InvalidOptions(format!(
                "can't stat repositories path folder {}",
                self.repositories_path.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(ServerError::InvalidOptions(format!(
                "repositories path folder {} is not a folder",
                self.repositories_path.display()
            )));
        }

        Ok(())
    }

    /// Builds the git client settings.
    pub fn git_client_config(&self) -> Result<GitClientConfig, ServerError> {
        let mut builder = GitClientConfig::builder()
            .repositories_path(&self.repositories_path)
            .timeout(self.git_timeout);
        if let Some(key) = &self.ssh_key {
            builder = builder.ssh_key(key);
        }
        if let Some(passphrase) = &self.ssh_key_passphrase {
            builder = builder.passphrase(passphrase);
        }

        builder
            .build()
            .map_err(|e| ServerError::InvalidOptions(e.to_string()))
    }
}
