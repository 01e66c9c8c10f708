//! GitLab project hooks.

use std::time::Duration;

use async_trait::async_trait;
use pullmirror_core::GitUrl;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WebhookError;
use crate::{WebhookClient, require};

/// Default GitLab API root.
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com/api/v4";

/// Options for [`GitLabClient`].
#[derive(Debug, Clone)]
pub struct GitLabOptions {
    /// Personal or project access token with `api` scope.
    pub token: String,
    /// API root, such as `https://gitlab.com/api/v4`.
    pub url: String,
    /// Where GitLab delivers push events.
    pub callback_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

/// Manages project hooks on GitLab and parses their payloads.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
    options: GitLabOptions,
}

#[derive(Debug, Deserialize)]
struct ProjectHook {
    url: String,
}

#[derive(Debug, Serialize)]
struct NewProjectHook<'a> {
    url: &'a str,
    push_events: bool,
    tag_push_events: bool,
}

#[derive(Debug, Deserialize)]
struct HookPayload {
    project: PayloadProject,
}

#[derive(Debug, Deserialize)]
struct PayloadProject {
    path_with_namespace: String,
}

impl GitLabClient {
    /// Creates a client, checking that every option is set.
    pub fn new(options: GitLabOptions) -> Result<Self, WebhookError> {
        require(&options.token, "GitLab token")?;
        require(&options.url, "GitLab url")?;
        require(&options.callback_url, "Callback url")?;

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;

        Ok(Self { http, options })
    }

    fn hooks_url(&self, url: &GitUrl) -> String {
        format!(
            "{}/projects/{}/hooks",
            self.options.url.trim_end_matches('/'),
            urlencoding::encode(&url.to_key())
        )
    }
}

#[async_trait]
impl WebhookClient for GitLabClient {
    async fn register_webhook(&self, url: &GitUrl) -> Result<(), WebhookError> {
        debug!("registering webhook for {url}");
        let hooks_url = self.hooks_url(url);

        let response = self
            .http
            .get(&hooks_url)
            .header("PRIVATE-TOKEN", &self.options.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebhookError::from_response(response).await);
        }

        let hooks: Vec<ProjectHook> = response.json().await?;
        if hooks.iter().any(|hook| hook.url == self.options.callback_url) {
            debug!("webhook for {url} already registered");
            return Ok(());
        }

        let response = self
            .http
            .post(&hooks_url)
            .header("PRIVATE-TOKEN", &self.options.token)
            .json(&NewProjectHook {
                url: &self.options.callback_url,
                push_events: true,
                tag_push_events: true,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebhookError::from_response(response).await);
        }

        debug!("webhook for {url} correctly registered");
        Ok(())
    }

    fn parse_hook_payload(&self, payload: &str) -> Result<String, WebhookError> {
        let payload: HookPayload =
            serde_json::from_str(payload).map_err(|e| WebhookError::Payload(e.to_string()))?;
        Ok(payload.project.path_with_namespace)
    }

    fn callback_url(&self) -> &str {
        &self.options.callback_url
    }
}
