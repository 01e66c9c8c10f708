//! Units of mirror work.

use std::sync::Arc;

use pullmirror_git::MirrorRepository;
use tokio_util::task::task_tracker::TaskTrackerToken;

/// Request identifier used for tasks triggered by an update-all.
pub const UPDATE_ALL_ID: &str = "update-all";

/// One fetch-then-push of a repository.
///
/// The task keeps the server's in-flight tracker open until it is dropped
/// by the worker that ran it.
pub struct Task {
    request_id: String,
    repository: Arc<MirrorRepository>,
    _inflight: TaskTrackerToken,
}

impl Task {
    /// Creates a task for `repository`.
    pub fn new(
        request_id: impl Into<String>,
        repository: Arc<MirrorRepository>,
        inflight: TaskTrackerToken,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            repository,
            _inflight: inflight,
        }
    }

    /// Returns the id of the request that produced this task.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the repository to update.
    pub fn repository(&self) -> &MirrorRepository {
        &self.repository
    }
}
