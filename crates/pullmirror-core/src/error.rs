//! Error types for URL parsing and configuration loading.
//!
//! Both are fatal to a configure pass but never to the process: the server
//! keeps its previous registry and waits for the next reload.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A git URL could not be turned into a [`GitUrl`](crate::GitUrl).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// Unrecognized scheme, missing host, or a path without owner and name.
    #[error("invalid git URL '{0}'")]
    InvalidUrl(String),
}

impl UrlError {
    pub(crate) fn invalid(uri: impl Into<String>) -> Self {
        Self::InvalidUrl(uri.into())
    }
}

/// Errors produced while loading the mirrors file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed reading configuration file {}: {source}", path.display())]
    Read {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// The file is not a valid mirrors document.
    #[error("failed to parse configuration file {source_name}: {message}")]
    Parse {
        /// File name or other description of the input
        source_name: String,
        /// Parser message
        message: String,
    },

    /// An origin URL is not a valid git URL.
    #[error("failed to parse origin url {uri}: {source}")]
    InvalidOrigin {
        /// The raw origin string
        uri: String,
        /// Why it was rejected
        #[source]
        source: UrlError,
    },

    /// A target URL is not a valid git URL.
    #[error("failed to parse target url {uri}: {source}")]
    InvalidTarget {
        /// The raw target string
        uri: String,
        /// Why it was rejected
        #[source]
        source: UrlError,
    },

    /// Two entries resolve to the same registry key.
    #[error("origin {key} is configured more than once")]
    DuplicateOrigin {
        /// The `owner/name` key both entries share
        key: String,
    },
}

impl ConfigError {
    /// Creates a parse error for the given input.
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
