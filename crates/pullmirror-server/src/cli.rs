//! Command line arguments of the `git-pull-mirror` binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use pullmirror_webhooks::{
    DEFAULT_GITHUB_URL, DEFAULT_GITLAB_URL, GitHubClient, GitHubOptions, GitLabClient,
    GitLabOptions, WebhookClient, WebhookError,
};

use crate::options::{DEFAULT_CONCURRENCY, ServerOptions};

/// Invalid command line arguments.
#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("{name} is mandatory, please set it through {hint}")]
    Missing {
        name: &'static str,
        hint: &'static str,
    },

    #[error("invalid {name} '{value}': {message}")]
    Invalid {
        name: &'static str,
        value: String,
        message: String,
    },
}

impl ArgsError {
    fn invalid(name: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            value: value.into(),
            message: message.into(),
        }
    }
}

/// Webhook provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Github,
    Gitlab,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "git-pull-mirror",
    version,
    about = "Mirrors git repositories when their provider sends a push webhook"
)]
pub struct Args {
    /// Address in which to listen for webhooks, `:9092` binds every interface.
    #[arg(long, default_value = ":9092")]
    pub listen_address: String,

    /// Mirrors configuration file.
    #[arg(long, default_value = "mirrors.yml")]
    pub config_file: PathBuf,

    /// Callback URL reported to the provider; must include scheme, host and path.
    #[arg(long, env = "CALLBACK_URL", default_value = "")]
    pub callback_url: String,

    /// Which provider sends the webhooks.
    #[arg(long, value_enum, default_value_t = Provider::Github)]
    pub provider: Provider,

    /// GitHub username, used to register webhooks.
    #[arg(long, env = "GITHUB_USER", default_value = "")]
    pub github_user: String,

    /// GitHub token, used as the password to register webhooks.
    #[arg(long, env = "GITHUB_TOKEN", default_value = "", hide_env_values = true)]
    pub github_token: String,

    /// GitHub hub URL.
    #[arg(long, default_value = DEFAULT_GITHUB_URL)]
    pub github_url: String,

    /// GitLab token with `api` scope, used to register webhooks.
    #[arg(long, env = "GITLAB_TOKEN", default_value = "", hide_env_values = true)]
    pub gitlab_token: String,

    /// GitLab API URL.
    #[arg(long, default_value = DEFAULT_GITLAB_URL)]
    pub gitlab_url: String,

    /// Local path in which to store cloned repositories.
    #[arg(long, default_value = ".")]
    pub repositories_path: PathBuf,

    /// SSH key used to identify to remotes.
    #[arg(long, env = "SSH_KEY")]
    pub ssh_key: Option<PathBuf>,

    /// Passphrase of the SSH key.
    #[arg(long, env = "SSH_KEY_PASSPHRASE", hide_env_values = true)]
    pub ssh_key_passphrase: Option<String>,

    /// Git operations timeout in seconds.
    #[arg(long, default_value_t = 60)]
    pub git_timeout_seconds: u64,

    /// Number of repositories updated concurrently.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Don't register webhooks.
    #[arg(long)]
    pub skip_webhooks_registration: bool,

    /// Enable the debug log level.
    #[arg(long)]
    pub debug: bool,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Checks that the arguments make sense before anything is started.
    pub fn validate(&self) -> Result<(), ArgsError> {
        if self.config_file.as_os_str().is_empty() {
            return Err(ArgsError::Missing {
                name: "config file",
                hint: "--config-file",
            });
        }

        self.listen_addr()?;
        validate_callback_url(&self.callback_url)?;

        match self.provider {
            Provider::Github => {
                if self.github_user.trim().is_empty() {
                    return Err(ArgsError::Missing {
                        name: "GitHub user",
                        hint: "the GITHUB_USER variable or --github-user",
                    });
                }
                if self.github_token.trim().is_empty() {
                    return Err(ArgsError::Missing {
                        name: "GitHub token",
                        hint: "the GITHUB_TOKEN variable or --github-token",
                    });
                }
                url::Url::parse(&self.github_url)
                    .map_err(|e| ArgsError::invalid("GitHub url", &self.github_url, e.to_string()))?;
            }
            Provider::Gitlab => {
                if self.gitlab_token.trim().is_empty() {
                    return Err(ArgsError::Missing {
                        name: "GitLab token",
                        hint: "the GITLAB_TOKEN variable or --gitlab-token",
                    });
                }
                url::Url::parse(&self.gitlab_url)
                    .map_err(|e| ArgsError::invalid("GitLab url", &self.gitlab_url, e.to_string()))?;
            }
        }

        if let Some(key) = &self.ssh_key
            && let Err(e) = std::fs::metadata(key)
        {
            return Err(ArgsError::invalid(
                "ssh key",
                key.display().to_string(),
                e.to_string(),
            ));
        }

        if self.git_timeout_seconds == 0 {
            return Err(ArgsError::invalid(
                "git timeout seconds",
                "0",
                "it should be 1 or higher",
            ));
        }

        Ok(())
    }

    /// Resolves `--listen-address`, where an empty host means every interface.
    pub fn listen_addr(&self) -> Result<SocketAddr, ArgsError> {
        let address = if self.listen_address.starts_with(':') {
            format!("0.0.0.0{}", self.listen_address)
        } else {
            self.listen_address.clone()
        };

        address
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ArgsError::invalid("listen address", &self.listen_address, e.to_string())
            })
    }

    /// Returns the git timeout.
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_seconds)
    }

    /// Builds the server options.
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            git_timeout: self.git_timeout(),
            repositories_path: self.repositories_path.clone(),
            ssh_key: self.ssh_key.clone(),
            ssh_key_passphrase: self.ssh_key_passphrase.clone(),
            skip_webhook_registration: self.skip_webhooks_registration,
            concurrency: self.concurrency,
        }
    }

    /// Builds the client of the selected provider.
    pub fn webhook_client(&self) -> Result<Arc<dyn WebhookClient>, WebhookError> {
        let client: Arc<dyn WebhookClient> = match self.provider {
            Provider::Github => Arc::new(GitHubClient::new(GitHubOptions {
                user: self.github_user.clone(),
                token: self.github_token.clone(),
                url: self.github_url.clone(),
                callback_url: self.callback_url.clone(),
                timeout: self.git_timeout(),
            })?),
            Provider::Gitlab => Arc::new(GitLabClient::new(GitLabOptions {
                token: self.gitlab_token.clone(),
                url: self.gitlab_url.clone(),
                callback_url: self.callback_url.clone(),
                timeout: self.git_timeout(),
            })?),
        };
        Ok(client)
    }
}

fn validate_callback_url(callback_url: &str) -> Result<(), ArgsError> {
    if callback_url.trim().is_empty() {
        return Err(ArgsError::Missing {
            name: "callback URL",
            hint: "the CALLBACK_URL variable or --callback-url",
        });
    }

    let parsed = url::Url::parse(callback_url)
        .map_err(|e| ArgsError::invalid("callback URL", callback_url, e.to_string()))?;
    let has_host = parsed.host_str().is_some_and(|host| !host.is_empty());
    let has_path = !parsed.path().trim_matches('/').is_empty();
    if !has_host || !has_path {
        return Err(ArgsError::invalid(
            "callback URL",
            callback_url,
            "it should include a host and a path",
        ));
    }

    Ok(())
}
