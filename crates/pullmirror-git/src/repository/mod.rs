//! Local bare clones and the operations run on them.

mod auth;
mod config;
mod git_ops;
pub mod refspec;

pub use auth::AuthMethod;
pub use config::{GitClientConfig, GitClientConfigBuilder};
pub use git_ops::{GitClient, MirrorRepository, PushReport};
