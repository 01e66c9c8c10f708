//! GitHub PubSubHubbub subscriptions.

use std::time::Duration;

use async_trait::async_trait;
use pullmirror_core::GitUrl;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::WebhookError;
use crate::{WebhookClient, require};

/// Default GitHub hub endpoint.
pub const DEFAULT_GITHUB_URL: &str = "https://api.github.com/hub";

/// Options for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct GitHubOptions {
    /// Account owning the token.
    pub user: String,
    /// Personal access token.
    pub token: String,
    /// Hub endpoint.
    pub url: String,
    /// Where GitHub delivers push events.
    pub callback_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

/// Registers push subscriptions with GitHub and parses their payloads.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    options: GitHubOptions,
}

impl GitHubClient {
    /// Creates a client, checking that every option is set.
    pub fn new(options: GitHubOptions) -> Result<Self, WebhookError> {
        require(&options.user, "GitHub username")?;
        require(&options.token, "GitHub token")?;
        require(&options.url, "GitHub url")?;
        require(&options.callback_url, "Callback url")?;

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;

        Ok(Self { http, options })
    }

    async fn subscribe(
        &self,
        method: Method,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, WebhookError> {
        let response = self
            .http
            .request(method, &self.options.url)
            .basic_auth(&self.options.user, Some(&self.options.token))
            .form(form)
            .send()
            .await?;
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct HookPayload {
    repository: PayloadRepository,
}

#[derive(Debug, Deserialize)]
struct PayloadRepository {
    full_name: String,
}

#[async_trait]
impl WebhookClient for GitHubClient {
    async fn register_webhook(&self, url: &GitUrl) -> Result<(), WebhookError> {
        debug!("registering webhook for {url}");

        let topic = format!("https://{url}/events/push");
        let form = [
            ("hub.mode", "subscribe"),
            ("hub.topic", topic.as_str()),
            ("hub.callback", self.options.callback_url.as_str()),
        ];

        let mut response = self.subscribe(Method::PATCH, &form).await?;
        if response.status() == StatusCode::NOT_FOUND {
            response = self.subscribe(Method::POST, &form).await?;
        }

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => {
                debug!("webhook for {url} correctly registered");
                Ok(())
            }
            _ => Err(WebhookError::from_response(response).await),
        }
    }

    fn parse_hook_payload(&self, payload: &str) -> Result<String, WebhookError> {
        let payload: HookPayload =
            serde_json::from_str(payload).map_err(|e| WebhookError::Payload(e.to_string()))?;
        Ok(payload.repository.full_name)
    }

    fn callback_url(&self) -> &str {
        &self.options.callback_url
    }
}
