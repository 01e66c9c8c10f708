//! Error types for mirror repository operations.

use std::path::PathBuf;

/// Errors that can occur while materializing or updating a mirror.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// Cloning the origin failed (network, auth, or timeout).
    #[error("failed to clone {origin}: {message}")]
    Clone { origin: String, message: String },

    /// The local repository exists but cannot be used.
    #[error("failed to open repository at {}: {message}", path.display())]
    Open { path: PathBuf, message: String },

    /// Key material is missing or unreadable.
    #[error("authentication setup failed: {0}")]
    Auth(String),

    /// Fetching from the origin failed.
    #[error("failed to fetch {origin}: {message}")]
    Fetch { origin: String, message: String },

    /// Pushing to the target failed after all attempts.
    #[error("failed to push to {target} after {attempts} attempt(s): {message}")]
    Push {
        target: String,
        attempts: u32,
        message: String,
    },

    /// A git operation exceeded the configured timeout.
    #[error("git {operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    /// A libgit2 call failed.
    #[error("git error: {0}")]
    Git(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Creates a new Git error.
    pub fn git(msg: impl Into<String>) -> Self {
        Self::Git(msg.into())
    }

    /// Creates a new open error.
    pub fn open(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Open {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Returns the number of push attempts if this is a push failure.
    pub fn push_attempts(&self) -> Option<u32> {
        match self {
            Self::Push { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Returns true if this error might go away on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Fetch { .. } | Self::Push { .. } | Self::Git(_)
        )
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        Self::Git(err.message().to_string())
    }
}
