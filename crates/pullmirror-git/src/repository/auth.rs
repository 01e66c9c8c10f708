//! Credential selection per transport.

use std::path::PathBuf;

use git2::{Cred, RemoteCallbacks};
use pullmirror_core::{GitUrl, Transport};
use tracing::warn;

use super::config::GitClientConfig;
use crate::error::GitError;

/// Credentials handed to libgit2 for one remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// No credentials.
    None,
    /// Public key authentication.
    SshKey {
        username: String,
        private_key: PathBuf,
        passphrase: Option<String>,
    },
    /// HTTP basic authentication.
    Basic { username: String, password: String },
}

impl AuthMethod {
    /// Picks the credentials for `url`.
    ///
    /// `ssh` remotes use the configured key; a missing key means no
    /// authentication. HTTP remotes use the credentials embedded in the URL.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::Auth`] when a key is configured but unreadable.
    pub fn resolve(url: &GitUrl, config: &GitClientConfig) -> Result<Self, GitError> {
        match url.transport() {
            Transport::Ssh => {
                let Some(key) = config.private_key() else {
                    warn!("{url} uses ssh but no ssh key is configured, trying without credentials");
                    return Ok(Self::None);
                };

                std::fs::File::open(key).map_err(|e| {
                    GitError::Auth(format!("failed to read ssh key {}: {e}", key.display()))
                })?;

                Ok(Self::SshKey {
                    username: url.username().unwrap_or("git").to_string(),
                    private_key: key.to_path_buf(),
                    passphrase: config.passphrase().map(str::to_string),
                })
            }
            Transport::Http => match url.username() {
                Some(username) => Ok(Self::Basic {
                    username: username.to_string(),
                    password: url.password().unwrap_or_default().to_string(),
                }),
                None => Ok(Self::None),
            },
            Transport::File => Ok(Self::None),
        }
    }

    /// Installs a credentials callback on `callbacks`.
    ///
    /// libgit2 calls back again after a rejected credential, so each callback
    /// only answers once.
    pub(crate) fn install<'a>(&'a self, callbacks: &mut RemoteCallbacks<'a>) {
        let mut answered = false;
        match self {
            Self::None => {}
            Self::SshKey {
                username,
                private_key,
                passphrase,
            } => {
                callbacks.credentials(move |_url, username_from_url, _allowed| {
                    if std::mem::replace(&mut answered, true) {
                        return Err(git2::Error::from_str("ssh key was rejected"));
                    }
                    Cred::ssh_key(
                        username_from_url.unwrap_or(username.as_str()),
                        None,
                        private_key,
                        passphrase.as_deref(),
                    )
                });
            }
            Self::Basic { username, password } => {
                callbacks.credentials(move |_url, _username_from_url, _allowed| {
                    if std::mem::replace(&mut answered, true) {
                        return Err(git2::Error::from_str("credentials were rejected"));
                    }
                    Cred::userpass_plaintext(username, password)
                });
            }
        }
    }
}
