//! Mirror state tracking.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::Serialize;

/// Tracks the outcome of the most recent operations on one mirror.
#[derive(Debug, Default)]
pub struct MirrorState {
    /// The last successful fetch.
    last_fetch: RwLock<Option<SystemTime>>,
    /// The last successful push.
    last_push: RwLock<Option<SystemTime>>,
    /// The last error message, if any.
    last_error: RwLock<Option<String>>,
    /// Number of consecutive failures.
    failure_count: RwLock<u32>,
}

impl MirrorState {
    /// Creates a new MirrorState.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful fetch.
    pub fn record_fetch(&self) {
        *self.last_fetch.write() = Some(SystemTime::now());
    }

    /// Records a successful push, which completes an update.
    pub fn record_push(&self) {
        let mut last_push = self.last_push.write();
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();

        *last_push = Some(SystemTime::now());
        *last_error = None;
        *failure_count = 0;
    }

    /// Records a failed operation.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();

        *last_error = Some(error.into());
        *failure_count += 1;
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the number of consecutive failures.
    pub fn failure_count(&self) -> u32 {
        *self.failure_count.read()
    }

    /// Returns true if the last operation succeeded.
    pub fn is_healthy(&self) -> bool {
        self.last_error.read().is_none()
    }

    /// Returns a serializable snapshot.
    pub fn status(&self) -> MirrorStatus {
        MirrorStatus {
            last_fetch: self.last_fetch.read().and_then(unix_seconds),
            last_push: self.last_push.read().and_then(unix_seconds),
            last_error: self.last_error(),
            consecutive_failures: self.failure_count(),
            healthy: self.is_healthy(),
        }
    }
}

fn unix_seconds(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// Point-in-time view of a [`MirrorState`].
#[derive(Debug, Clone, Serialize)]
pub struct MirrorStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetch: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_push: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub healthy: bool,
}
