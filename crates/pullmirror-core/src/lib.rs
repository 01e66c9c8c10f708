//! # pullmirror-core
//!
//! Domain types shared by every git-pull-mirror crate.
//!
//! - [`GitUrl`]: the immutable descriptor of a git remote (transport, domain,
//!   owner, name, credentials) and its canonical on-disk path.
//! - [`MirrorConfig`]: the list of origin/target pairs read from the YAML
//!   mirrors file.
//!
//! ## Example
//!
//! ```
//! use pullmirror_core::GitUrl;
//!
//! let url = GitUrl::parse("git@github.com:yakshaving-art/git-pull-mirror.git").unwrap();
//! assert_eq!(url.to_path(), "github.com/yakshaving-art/git-pull-mirror");
//! assert_eq!(url.to_key(), "yakshaving-art/git-pull-mirror");
//! ```

pub mod config;
pub mod error;
pub mod url;

pub use config::{MirrorConfig, RepositoryConfig};
pub use error::{ConfigError, UrlError};
pub use url::{GitUrl, Transport};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
