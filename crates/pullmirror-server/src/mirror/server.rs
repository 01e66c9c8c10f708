//! Mirror server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use pullmirror_core::MirrorConfig;
use pullmirror_git::{GitClient, MirrorRepository};
use pullmirror_webhooks::WebhookClient;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::{debug, error, info, warn};

use super::manager::{Registry, RepositoryManager};
use super::queue::{TaskQueue, TaskSender};
use super::task::{Task, UPDATE_ALL_ID};
use crate::error::{AppError, ConfigureError, ServerError};
use crate::metrics::{Label, Observability, names, unix_now};
use crate::options::ServerOptions;

/// State guarded by the server lock.
struct Shared {
    registry: Arc<Registry>,
    ready: bool,
    running: bool,
}

/// Work admitted by [`MirrorServer::admit`].
pub(crate) struct Admission {
    inflight: TaskTrackerToken,
}

/// Snapshot of the server state.
#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub ready: bool,
    pub running: bool,
    pub repositories: Vec<Arc<MirrorRepository>>,
}

/// Owns the repository registry, the worker pool and the HTTP listener.
///
/// `ready` becomes true after the first successful configure pass and never
/// goes back. `running` is true between binding the listener and the start of
/// a shutdown.
pub struct MirrorServer {
    shared: Mutex<Shared>,
    configuring: tokio::sync::Mutex<()>,
    queue: Mutex<Option<TaskQueue<Task>>>,
    inflight: TaskTracker,
    stop: CancellationToken,
    manager: RepositoryManager,
    webhooks: Arc<dyn WebhookClient>,
    observability: Arc<dyn Observability>,
    options: ServerOptions,
}

impl MirrorServer {
    /// Creates an unconfigured server.
    pub fn new(
        options: ServerOptions,
        webhooks: Arc<dyn WebhookClient>,
        observability: Arc<dyn Observability>,
    ) -> Result<Arc<Self>, ServerError> {
        options.validate()?;
        let git = Arc::new(GitClient::new(options.git_client_config()?));
        let manager = RepositoryManager::new(
            git,
            Arc::clone(&webhooks),
            options.skip_webhook_registration,
        );

        observability.set_gauge(names::BOOT_TIME, &[], unix_now());
        observability.set_gauge(names::SERVER_UP, &[], 0.0);

        Ok(Arc::new(Self {
            shared: Mutex::new(Shared {
                registry: Arc::new(Registry::new()),
                ready: false,
                running: false,
            }),
            configuring: tokio::sync::Mutex::new(()),
            queue: Mutex::new(None),
            inflight: TaskTracker::new(),
            stop: CancellationToken::new(),
            manager,
            webhooks,
            observability,
            options,
        }))
    }

    /// Returns the webhook provider client.
    pub fn webhooks(&self) -> &dyn WebhookClient {
        self.webhooks.as_ref()
    }

    /// Returns the observability sink.
    pub fn observability(&self) -> &dyn Observability {
        self.observability.as_ref()
    }

    /// Returns a snapshot of the lifecycle flags and the registry.
    pub fn status(&self) -> ServerStatus {
        let shared = self.shared.lock();
        let mut repositories: Vec<_> = shared.registry.values().cloned().collect();
        repositories.sort_by_key(|r| r.origin().to_path());
        ServerStatus {
            ready: shared.ready,
            running: shared.running,
            repositories,
        }
    }

    /// Builds a registry for `config` and swaps it in.
    ///
    /// On failure the current registry stays active. Safe to call again at
    /// any time, before or after [`run`](Self::run). Passes run one at a
    /// time, in call order.
    pub async fn configure(&self, config: &MirrorConfig) -> Result<(), ConfigureError> {
        let _pass = self.configuring.lock().await;
        debug!("loading configuration with {} repositories", config.len());

        let registry = self.manager.build(config).await?;
        let count = registry.len();

        {
            let mut shared = self.shared.lock();
            shared.registry = Arc::new(registry);
            shared.ready = true;
        }

        self.observability
            .set_gauge(names::LAST_SUCCESSFUL_CONFIG_APPLY, &[], unix_now());
        info!("configuration loaded successfully with {count} repositories");
        Ok(())
    }

    /// Configures the server, starts the workers and serves HTTP until
    /// [`shutdown`](Self::shutdown).
    ///
    /// A failed initial configuration is logged and the server listens anyway
    /// so a reload can fix it. `ready` receives the bound address.
    pub async fn run(
        self: &Arc<Self>,
        addr: SocketAddr,
        config: MirrorConfig,
        ready: Option<oneshot::Sender<SocketAddr>>,
    ) -> Result<(), ServerError> {
        if let Err(e) = self.configure(&config).await {
            error!("initial configuration failed, waiting for a reload: {e}");
        }

        let callback_path = callback_path(self.webhooks.callback_url())?;
        self.start_workers();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        let app = crate::server::create_router(Arc::clone(self), &callback_path);

        self.shared.lock().running = true;
        self.observability.set_gauge(names::SERVER_UP, &[], 1.0);
        info!("listening for webhooks on {local_addr}{callback_path}");

        if let Some(ready) = ready {
            let _ = ready.send(local_addr);
        }

        let stop = self.stop.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await?;

        info!("server stopped");
        Ok(())
    }

    /// Rejects new work, waits for in-flight requests and tasks, then stops
    /// the workers and the listener.
    pub async fn shutdown(&self) {
        info!("shutting down");
        self.shared.lock().running = false;
        self.observability.set_gauge(names::SERVER_UP, &[], 0.0);

        self.inflight.close();
        self.inflight.wait().await;

        let queue = self.queue.lock().take();
        if let Some(queue) = queue {
            queue.close().await;
        }

        self.stop.cancel();
        info!("all in-flight work finished");
    }

    /// Enqueues an update of every registered repository.
    ///
    /// Does nothing until the server is ready and running.
    pub async fn update_all(&self) {
        let (repositories, sender, _inflight) = {
            let shared = self.shared.lock();
            if !shared.ready {
                warn!("update all requested before the server is ready, ignoring");
                return;
            }
            let Some(sender) = self.queue.lock().as_ref().map(TaskQueue::sender) else {
                warn!("update all requested while workers are not running, ignoring");
                return;
            };
            let repositories: Vec<_> = shared.registry.values().cloned().collect();
            (repositories, sender, self.inflight.token())
        };

        info!("updating all {} repositories", repositories.len());
        for repository in repositories {
            let task = Task::new(UPDATE_ALL_ID, repository, self.inflight.token());
            if sender.enqueue(task).await.is_err() {
                warn!("task queue closed, stopping update all");
                break;
            }
        }
    }

    /// Admits a webhook request if the server is running and ready.
    ///
    /// The admission keeps shutdown waiting until it is dropped.
    pub(crate) fn admit(&self) -> Result<Admission, AppError> {
        let shared = self.shared.lock();
        if !shared.running {
            return Err(AppError::Unavailable("server is not running".to_string()));
        }
        if !shared.ready {
            return Err(AppError::Unavailable("server is not ready".to_string()));
        }
        Ok(Admission {
            inflight: self.inflight.token(),
        })
    }

    /// Looks up `key` and builds a task for it.
    pub(crate) fn task_for(
        &self,
        key: &str,
        request_id: &str,
        admission: &Admission,
    ) -> Result<(Task, TaskSender<Task>), AppError> {
        let shared = self.shared.lock();
        let repository = shared
            .registry
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::UnknownRepository(key.to_string()))?;
        let sender = self
            .queue
            .lock()
            .as_ref()
            .map(TaskQueue::sender)
            .ok_or_else(|| AppError::Unavailable("workers are not running".to_string()))?;

        let task = Task::new(request_id, repository, admission.inflight.clone());
        Ok((task, sender))
    }

    fn start_workers(&self) {
        let mut queue = self.queue.lock();
        if queue.is_some() {
            return;
        }

        let observability = Arc::clone(&self.observability);
        *queue = Some(TaskQueue::start(self.options.concurrency, move |task: Task| {
            let observability = Arc::clone(&observability);
            async move { update_repository(observability.as_ref(), task).await }
        }));
        info!("started {} workers", self.options.concurrency);
    }
}

/// Extracts the path webhooks are delivered to.
///
/// The path must not collide with the built-in endpoints.
fn callback_path(callback_url: &str) -> Result<String, ServerError> {
    let invalid = |message: String| ServerError::InvalidCallbackUrl {
        url: callback_url.to_string(),
        message,
    };

    let parsed = url::Url::parse(callback_url).map_err(|e| invalid(e.to_string()))?;
    let path = parsed.path().to_string();
    if crate::server::RESERVED_PATHS.contains(&path.as_str()) {
        return Err(invalid(format!("path {path} is reserved")));
    }

    Ok(path)
}

/// Fetches then pushes one repository, recording the outcome.
pub(crate) async fn update_repository(observability: &dyn Observability, task: Task) {
    let repository = task.repository();
    let request_id = task.request_id();
    let repo_label: Vec<Label> = vec![("repo", repository.origin().to_path())];

    let start = Instant::now();
    if let Err(e) = repository.fetch().await {
        error!(
            request_id,
            "failed to fetch repo {}: {e}",
            repository.origin()
        );
        observability.inc_counter(names::HOOKS_FAILED, &repo_label);
        observability.set_gauge(names::REPOSITORY_UP, &repo_label, 0.0);
        return;
    }
    observability.observe_latency(
        names::GIT_LATENCY,
        &latency_labels("fetch", &repo_label),
        start.elapsed().as_secs_f64(),
    );

    let start = Instant::now();
    match repository.push().await {
        Ok(report) => {
            observability.observe_latency(
                names::GIT_LATENCY,
                &latency_labels("push", &repo_label),
                start.elapsed().as_secs_f64(),
            );
            for _ in 1..report.attempts {
                observability.inc_counter(names::HOOKS_RETRIED, &repo_label);
            }
            observability.inc_counter(names::HOOKS_UPDATED, &repo_label);
            observability.set_gauge(names::REPOSITORY_UP, &repo_label, 1.0);
            debug!(
                request_id,
                "repository {} pushed to {}",
                repository.origin(),
                repository.target()
            );
        }
        Err(e) => {
            for _ in 1..e.push_attempts().unwrap_or(1) {
                observability.inc_counter(names::HOOKS_RETRIED, &repo_label);
            }
            error!(
                request_id,
                "failed to push repo {} to {}: {e}",
                repository.origin(),
                repository.target()
            );
            observability.inc_counter(names::HOOKS_FAILED, &repo_label);
            observability.set_gauge(names::REPOSITORY_UP, &repo_label, 0.0);
        }
    }
}

fn latency_labels(operation: &str, repo_label: &[Label]) -> Vec<Label> {
    let mut labels = vec![("operation", operation.to_string())];
    labels.extend_from_slice(repo_label);
    labels
}
