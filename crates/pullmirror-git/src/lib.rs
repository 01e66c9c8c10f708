//! # git-pull-mirror repositories
//!
//! Maintains one bare local clone per mirrored origin and moves refs from
//! the origin to the target.
//!
//! ## Features
//!
//! - Idempotent clone-or-open, reconciling remote URLs on reuse
//! - Fetch of all branches and tags, force-updating local refs
//! - Push of every origin branch and tag, retried with jittered backoff
//! - Every operation bounded by a timeout
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pullmirror_core::GitUrl;
//! use pullmirror_git::{GitClient, GitClientConfig};
//!
//! let config = GitClientConfig::builder()
//!     .repositories_path("/var/lib/git-pull-mirror")
//!     .ssh_key("/etc/git-pull-mirror/id_rsa")
//!     .build()?;
//! let client = Arc::new(GitClient::new(config));
//!
//! let repo = client
//!     .clone_or_open(
//!         GitUrl::parse("https://github.com/org/repo.git")?,
//!         GitUrl::parse("git@gitlab.com:org/repo.git")?,
//!     )
//!     .await?;
//! repo.fetch().await?;
//! repo.push().await?;
//! ```

pub mod error;
pub mod repository;
pub mod sync;

// Re-exports
pub use error::GitError;
pub use repository::{AuthMethod, GitClient, GitClientConfig, MirrorRepository, PushReport};
pub use sync::{MirrorState, MirrorStatus, PushBackoff};

pub use pullmirror_core;
