//! # git-pull-mirror webhooks
//!
//! Provider clients that subscribe the mirror server to push events and
//! extract the repository identifier from the payloads they deliver.
//!
//! - [`GitHubClient`]: PubSubHubbub subscriptions, `repository.full_name`
//! - [`GitLabClient`]: project hooks, `project.path_with_namespace`

pub mod error;
pub mod github;
pub mod gitlab;

use async_trait::async_trait;
use pullmirror_core::GitUrl;

pub use error::WebhookError;
pub use github::{DEFAULT_GITHUB_URL, GitHubClient, GitHubOptions};
pub use gitlab::{DEFAULT_GITLAB_URL, GitLabClient, GitLabOptions};

/// A webhook provider.
#[async_trait]
pub trait WebhookClient: Send + Sync {
    /// Subscribes the callback URL to push events of `url`.
    async fn register_webhook(&self, url: &GitUrl) -> Result<(), WebhookError>;

    /// Extracts the `owner/name` identifier from a hook payload.
    fn parse_hook_payload(&self, payload: &str) -> Result<String, WebhookError>;

    /// Returns the URL hooks are delivered to.
    fn callback_url(&self) -> &str;
}

fn require(value: &str, name: &'static str) -> Result<(), WebhookError> {
    if value.is_empty() {
        return Err(WebhookError::MissingOption(name));
    }
    Ok(())
}
