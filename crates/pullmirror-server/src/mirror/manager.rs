//! Builds the repository registry for a configuration.

use std::collections::HashMap;
use std::sync::Arc;

use pullmirror_core::{GitUrl, MirrorConfig};
use pullmirror_git::{GitClient, GitError, MirrorRepository};
use pullmirror_webhooks::WebhookClient;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::{ConfigureError, RepositoryFailure};

/// Repositories keyed by the origin's provider key (`owner/name`).
pub type Registry = HashMap<String, Arc<MirrorRepository>>;

/// Materializes every configured repository.
pub struct RepositoryManager {
    git: Arc<GitClient>,
    webhooks: Arc<dyn WebhookClient>,
    skip_registration: bool,
}

impl RepositoryManager {
    /// Creates a manager.
    pub fn new(
        git: Arc<GitClient>,
        webhooks: Arc<dyn WebhookClient>,
        skip_registration: bool,
    ) -> Self {
        Self {
            git,
            webhooks,
            skip_registration,
        }
    }

    /// Clones or opens, then fetches, every configured repository
    /// concurrently and registers its webhook.
    ///
    /// Any failure fails the whole pass and the partial registry is dropped.
    /// Webhook registration failures are only logged.
    pub async fn build(&self, config: &MirrorConfig) -> Result<Registry, ConfigureError> {
        let mut pending = JoinSet::new();

        for entry in config.repositories() {
            let git = Arc::clone(&self.git);
            let webhooks = Arc::clone(&self.webhooks);
            let skip_registration = self.skip_registration;
            let origin = entry.origin().clone();
            let target = entry.target().clone();

            pending.spawn(async move {
                let result =
                    materialize(&git, webhooks.as_ref(), skip_registration, &origin, target).await;
                (origin, result)
            });
        }

        let mut registry = Registry::with_capacity(config.len());
        let mut failures = Vec::new();

        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((origin, Ok(repository))) => {
                    registry.insert(origin.to_key(), Arc::new(repository));
                }
                Ok((origin, Err(e))) => {
                    error!("failed to clone or open repository {origin}: {e}");
                    failures.push(RepositoryFailure {
                        origin: origin.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    error!("repository setup task failed: {e}");
                    failures.push(RepositoryFailure {
                        origin: "<unknown>".to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(ConfigureError::new(failures));
        }

        Ok(registry)
    }
}

async fn materialize(
    git: &Arc<GitClient>,
    webhooks: &dyn WebhookClient,
    skip_registration: bool,
    origin: &GitUrl,
    target: GitUrl,
) -> Result<MirrorRepository, GitError> {
    let repository = git.clone_or_open(origin.clone(), target).await?;
    repository.fetch().await?;

    if skip_registration {
        debug!("skipping webhook registration for {origin}");
    } else if let Err(e) = webhooks.register_webhook(origin).await {
        warn!("failed to register webhook for {origin}: {e}");
    }

    Ok(repository)
}
