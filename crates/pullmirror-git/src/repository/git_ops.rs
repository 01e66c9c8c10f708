//! Mirror repository operations using libgit2.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use git2::build::RepoBuilder;
use git2::{AutotagOption, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks, Repository};
use parking_lot::Mutex;
use pullmirror_core::GitUrl;
use tracing::{debug, info, warn};

use super::auth::AuthMethod;
use super::config::GitClientConfig;
use super::refspec::{
    mirror_refspecs, ORIGIN_HEADS, ORIGIN_REMOTE, ORIGIN_TAGS, TARGET_REMOTE,
};
use crate::error::GitError;
use crate::sync::MirrorState;

/// Point in time after which a blocking operation gives up.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    fn error(&self, operation: &'static str) -> GitError {
        GitError::Timeout {
            operation,
            seconds: self.timeout.as_secs(),
        }
    }
}

/// Shared settings and entry point for mirror operations.
#[derive(Debug)]
pub struct GitClient {
    config: GitClientConfig,
}

impl GitClient {
    /// Creates a new client.
    ///
    /// Also bounds libgit2's connect and socket read timeouts by the
    /// configured timeout. These are process-wide settings.
    pub fn new(config: GitClientConfig) -> Self {
        set_transport_timeouts(config.timeout());
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GitClientConfig {
        &self.config
    }

    /// Returns where the local clone of `origin` lives.
    pub fn local_path(&self, origin: &GitUrl) -> PathBuf {
        self.config.repositories_path().join(origin.to_path())
    }

    /// Opens the local clone of `origin`, cloning it first if needed.
    ///
    /// Calling this again for the same pair is cheap and never re-clones. When
    /// the recorded remote URLs differ from `origin` or `target` they are
    /// replaced.
    pub async fn clone_or_open(
        self: &Arc<Self>,
        origin: GitUrl,
        target: GitUrl,
    ) -> Result<MirrorRepository, GitError> {
        let path = self.local_path(&origin);
        let auth = AuthMethod::resolve(&origin, &self.config)?;

        let repo = {
            let path = path.clone();
            let origin = origin.clone();
            let target = target.clone();
            let timeout = self.config.timeout();
            self.run_blocking("clone", timeout, move || {
                let deadline = Deadline::after(timeout);
                match open_existing(&path, &origin, &target)? {
                    Some(repo) => {
                        debug!("using existing clone of {origin} at {}", path.display());
                        Ok(repo)
                    }
                    None => {
                        info!("cloning {origin} into {}", path.display());
                        clone_blocking(&path, &origin, &target, &auth, deadline)
                    }
                }
            })
            .await?
        };

        Ok(MirrorRepository {
            client: Arc::clone(self),
            origin,
            target,
            path,
            repo: Arc::new(Mutex::new(repo)),
            state: Arc::new(MirrorState::new()),
        })
    }

    /// Runs `op` on the blocking pool, giving up on it after `bound`.
    async fn run_blocking<T, F>(
        &self,
        operation: &'static str,
        bound: Duration,
        op: F,
    ) -> Result<T, GitError>
    where
        F: FnOnce() -> Result<T, GitError> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(bound, tokio::task::spawn_blocking(op)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(GitError::git(format!("{operation} task failed: {e}"))),
            Err(_) => Err(GitError::Timeout {
                operation,
                seconds: self.config.timeout().as_secs(),
            }),
        }
    }

    /// Runs `op` with the repository locked.
    ///
    /// Waiting for the lock and running `op` are each bounded by the
    /// configured timeout; the deadline handed to `op` starts once the lock
    /// is held.
    async fn run_locked<T, F>(
        &self,
        operation: &'static str,
        repo: Arc<Mutex<Repository>>,
        op: F,
    ) -> Result<T, GitError>
    where
        F: FnOnce(&Repository, Deadline) -> Result<T, GitError> + Send + 'static,
        T: Send + 'static,
    {
        let timeout = self.config.timeout();
        self.run_blocking(operation, timeout * 2, move || {
            let repo = repo.try_lock_for(timeout).ok_or(GitError::Timeout {
                operation,
                seconds: timeout.as_secs(),
            })?;
            op(&repo, Deadline::after(timeout))
        })
        .await
    }
}

fn set_transport_timeouts(timeout: Duration) {
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    // SAFETY: libgit2 stores both values in plain globals read when a
    // transport connects or reads.
    #[allow(unused_unsafe)]
    let result = unsafe {
        git2::opts::set_server_connect_timeout_in_milliseconds(millis)
            .and_then(|()| git2::opts::set_server_timeout_in_milliseconds(millis))
    };
    if let Err(e) = result {
        warn!("failed to set git transport timeouts: {e}");
    }
}

/// Outcome of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// A bare local clone of one origin with its push target.
///
/// Operations on the same handle are serialized by the underlying repository
/// lock.
pub struct MirrorRepository {
    client: Arc<GitClient>,
    origin: GitUrl,
    target: GitUrl,
    path: PathBuf,
    repo: Arc<Mutex<Repository>>,
    state: Arc<MirrorState>,
}

impl std::fmt::Debug for MirrorRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorRepository")
            .field("origin", &self.origin)
            .field("target", &self.target)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl MirrorRepository {
    /// Returns the repository being mirrored from.
    pub fn origin(&self) -> &GitUrl {
        &self.origin
    }

    /// Returns the repository being mirrored to.
    pub fn target(&self) -> &GitUrl {
        &self.target
    }

    /// Returns the local clone location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the operation bookkeeping.
    pub fn state(&self) -> &MirrorState {
        &self.state
    }

    /// Fetches all branches and tags from the origin.
    pub async fn fetch(&self) -> Result<(), GitError> {
        debug!("fetching {}", self.origin);

        let auth = AuthMethod::resolve(&self.origin, self.client.config())?;
        let repo = Arc::clone(&self.repo);
        let origin = self.origin.clone();

        let result = self
            .client
            .run_locked("fetch", repo, move |repo, deadline| {
                fetch_blocking(repo, &origin, &auth, deadline)
            })
            .await;

        match &result {
            Ok(()) => self.state.record_fetch(),
            Err(e) => self.state.record_failure(e.to_string()),
        }
        result
    }

    /// Pushes every origin branch and tag to the target.
    ///
    /// Transient failures are retried with backoff. The report carries the number
    /// of attempts made.
    pub async fn push(&self) -> Result<PushReport, GitError> {
        debug!("pushing {} to {}", self.origin, self.target);

        let auth = match AuthMethod::resolve(&self.target, self.client.config()) {
            Ok(auth) => auth,
            Err(e) => {
                self.state.record_failure(e.to_string());
                return Err(e);
            }
        };
        let backoff = self.client.config().push_backoff().clone();

        let mut attempt = 0;
        loop {
            attempt += 1;

            let repo = Arc::clone(&self.repo);
            let target = self.target.clone();
            let auth = auth.clone();
            let result = self
                .client
                .run_locked("push", repo, move |repo, deadline| {
                    push_blocking(repo, &target, &auth, deadline)
                })
                .await;

            match result {
                Ok(()) => {
                    self.state.record_push();
                    return Ok(PushReport { attempts: attempt });
                }
                Err(e) if e.is_transient() && attempt < backoff.max_attempts() => {
                    let delay = backoff.delay(attempt - 1);
                    warn!(
                        "push of {} to {} failed (attempt {attempt}), retrying in {delay:?}: {e}",
                        self.origin, self.target
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let err = GitError::Push {
                        target: self.target.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    };
                    self.state.record_failure(err.to_string());
                    return Err(err);
                }
            }
        }
    }
}

fn callbacks<'a>(auth: &'a AuthMethod, deadline: Deadline) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    auth.install(&mut callbacks);
    // Returning false aborts the transfer.
    callbacks.transfer_progress(move |_| !deadline.expired());
    callbacks
}

fn fetch_options<'a>(auth: &'a AuthMethod, deadline: Deadline) -> FetchOptions<'a> {
    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks(auth, deadline));
    options.download_tags(AutotagOption::All);
    options
}

/// Opens an existing bare clone and reconciles its remotes.
///
/// Returns `None` when there is no repository at `path`.
fn open_existing(
    path: &Path,
    origin: &GitUrl,
    target: &GitUrl,
) -> Result<Option<Repository>, GitError> {
    let repo = match Repository::open_bare(path) {
        Ok(repo) => repo,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(GitError::open(path, e.message())),
    };

    reconcile_remote(&repo, ORIGIN_REMOTE, origin.uri())
        .map_err(|e| GitError::open(path, format!("{e}, consider wiping the local copy")))?;
    reconcile_remote(&repo, TARGET_REMOTE, target.uri())
        .map_err(|e| GitError::open(path, e.message()))?;

    Ok(Some(repo))
}

/// Makes sure `name` points at `url`, creating it if missing.
fn reconcile_remote(repo: &Repository, name: &str, url: &str) -> Result<(), git2::Error> {
    let recorded = match repo.find_remote(name) {
        Ok(remote) => remote.url().map(str::to_string),
        Err(e) if e.code() == ErrorCode::NotFound && name == TARGET_REMOTE => {
            repo.remote(name, url)?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if recorded.as_deref() != Some(url) {
        info!(
            "remote {name} changed from {} to {url}, updating",
            recorded.as_deref().unwrap_or("<none>")
        );
        repo.remote_set_url(name, url)?;
    }

    Ok(())
}

fn clone_blocking(
    path: &Path,
    origin: &GitUrl,
    target: &GitUrl,
    auth: &AuthMethod,
    deadline: Deadline,
) -> Result<Repository, GitError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let repo = RepoBuilder::new()
        .bare(true)
        .fetch_options(fetch_options(auth, deadline))
        .remote_create(|repo, name, url| {
            repo.remote_with_fetch(name, url, ORIGIN_HEADS)?;
            repo.remote_add_fetch(name, ORIGIN_TAGS)?;
            repo.find_remote(name)
        })
        .clone(origin.uri(), path)
        .map_err(|e| {
            if deadline.expired() {
                deadline.error("clone")
            } else {
                GitError::Clone {
                    origin: origin.to_string(),
                    message: e.message().to_string(),
                }
            }
        })?;

    repo.remote(TARGET_REMOTE, target.uri())?;

    Ok(repo)
}

fn fetch_blocking(
    repo: &Repository,
    origin: &GitUrl,
    auth: &AuthMethod,
    deadline: Deadline,
) -> Result<(), GitError> {
    if deadline.expired() {
        return Err(deadline.error("fetch"));
    }
    let mut remote = repo.find_remote(ORIGIN_REMOTE)?;
    let mut options = fetch_options(auth, deadline);

    remote
        .fetch(&[ORIGIN_HEADS, ORIGIN_TAGS], Some(&mut options), None)
        .map_err(|e| {
            if deadline.expired() {
                deadline.error("fetch")
            } else {
                GitError::Fetch {
                    origin: origin.to_string(),
                    message: e.message().to_string(),
                }
            }
        })
}

fn push_blocking(
    repo: &Repository,
    target: &GitUrl,
    auth: &AuthMethod,
    deadline: Deadline,
) -> Result<(), GitError> {
    let refspecs = mirror_refspecs(repo)?;
    if refspecs.is_empty() {
        debug!("nothing to push to {target}");
        return Ok(());
    }
    if deadline.expired() {
        return Err(deadline.error("push"));
    }

    let mut remote = repo.find_remote(TARGET_REMOTE)?;
    let mut rejected = Vec::new();
    {
        let mut callbacks = callbacks(auth, deadline);
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                rejected.push(format!("{refname}: {status}"));
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        remote.push(&refspecs, Some(&mut options)).map_err(|e| {
            if deadline.expired() {
                deadline.error("push")
            } else {
                GitError::from(e)
            }
        })?;
    }

    if !rejected.is_empty() {
        return Err(GitError::git(format!(
            "target rejected {}",
            rejected.join(", ")
        )));
    }

    Ok(())
}
