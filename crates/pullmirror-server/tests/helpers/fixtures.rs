//! Local repositories and a fake provider standing in for the outside world.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use git2::{Commit, Oid, Repository, Signature};
use parking_lot::Mutex;
use pullmirror_core::{GitUrl, MirrorConfig, RepositoryConfig, Transport};
use pullmirror_server::metrics::Label;
use pullmirror_server::{InMemoryObservability, MirrorServer, ServerError, ServerOptions};
use pullmirror_webhooks::{WebhookClient, WebhookError};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const CALLBACK_URL: &str = "http://mirror.test/webhook";

/// Records registrations; payloads are the `owner/name` key itself.
#[derive(Default)]
pub struct FakeWebhooks {
    registered: Mutex<Vec<String>>,
    fail_registration: bool,
}

impl FakeWebhooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_registration: true,
            ..Self::default()
        })
    }

    pub fn registered(&self) -> Vec<String> {
        let mut registered = self.registered.lock().clone();
        registered.sort();
        registered
    }
}

#[async_trait]
impl WebhookClient for FakeWebhooks {
    async fn register_webhook(&self, url: &GitUrl) -> Result<(), WebhookError> {
        self.registered.lock().push(url.to_key());
        if self.fail_registration {
            return Err(WebhookError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    fn parse_hook_payload(&self, payload: &str) -> Result<String, WebhookError> {
        match payload.trim() {
            key if key.contains('/') => Ok(key.to_string()),
            _ => Err(WebhookError::Payload("no repository in payload".to_string())),
        }
    }

    fn callback_url(&self) -> &str {
        CALLBACK_URL
    }
}

/// Origins with one commit on `main`, empty targets, and a mirrors root.
pub struct Mirrors {
    pub dir: TempDir,
    count: usize,
}

impl Mirrors {
    pub fn new(count: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let mirrors = Self { dir, count };

        std::fs::create_dir_all(mirrors.mirrors_root()).unwrap();
        for i in 0..count {
            let origin = Repository::init_bare(mirrors.origin_path(i)).unwrap();
            commit(&origin, "refs/heads/main", "README.md", &format!("repo {i}"));
            origin.set_head("refs/heads/main").unwrap();
            Repository::init_bare(mirrors.target_path(i)).unwrap();
        }

        mirrors
    }

    pub fn mirrors_root(&self) -> PathBuf {
        self.dir.path().join("mirrors")
    }

    pub fn origin_path(&self, i: usize) -> PathBuf {
        self.dir.path().join(format!("remotes/origin-{i}.git"))
    }

    pub fn target_path(&self, i: usize) -> PathBuf {
        self.dir.path().join(format!("remotes/target-{i}.git"))
    }

    /// The provider key of origin `i`.
    pub fn key(&self, i: usize) -> String {
        format!("acme/widgets-{i}")
    }

    pub fn origin_url(&self, i: usize) -> GitUrl {
        file_url(&self.origin_path(i), "localhost", "acme", &format!("widgets-{i}"))
    }

    pub fn target_url(&self, i: usize) -> GitUrl {
        file_url(&self.target_path(i), "localhost", "mirror", &format!("widgets-{i}"))
    }

    pub fn entry(&self, i: usize) -> RepositoryConfig {
        RepositoryConfig::new(self.origin_url(i), self.target_url(i))
    }

    /// Every pair.
    pub fn config(&self) -> MirrorConfig {
        self.config_of(&(0..self.count).collect::<Vec<_>>())
    }

    pub fn config_of(&self, indexes: &[usize]) -> MirrorConfig {
        MirrorConfig::new(indexes.iter().map(|&i| self.entry(i)).collect()).unwrap()
    }

    pub fn options(&self) -> ServerOptions {
        ServerOptions {
            git_timeout: Duration::from_secs(30),
            repositories_path: self.mirrors_root(),
            concurrency: 2,
            ..ServerOptions::default()
        }
    }

    pub fn server(
        &self,
        webhooks: Arc<FakeWebhooks>,
        observability: Arc<InMemoryObservability>,
    ) -> Arc<MirrorServer> {
        MirrorServer::new(self.options(), webhooks, observability).unwrap()
    }

    /// Adds a commit to the origin's `main` branch.
    pub fn push_to_origin(&self, i: usize, content: &str) -> Oid {
        let origin = Repository::open_bare(self.origin_path(i)).unwrap();
        commit(&origin, "refs/heads/main", "README.md", content)
    }

    pub fn origin_main(&self, i: usize) -> Option<Oid> {
        let origin = Repository::open_bare(self.origin_path(i)).unwrap();
        ref_target(&origin, "refs/heads/main")
    }

    pub fn target_main(&self, i: usize) -> Option<Oid> {
        let target = Repository::open_bare(self.target_path(i)).ok()?;
        ref_target(&target, "refs/heads/main")
    }

    /// True once the target's `main` matches the origin's.
    pub fn is_mirrored(&self, i: usize) -> bool {
        self.target_main(i).is_some() && self.target_main(i) == self.origin_main(i)
    }

    pub fn remove_origin(&self, i: usize) {
        std::fs::remove_dir_all(self.origin_path(i)).unwrap();
    }

    pub fn remove_target(&self, i: usize) {
        std::fs::remove_dir_all(self.target_path(i)).unwrap();
    }
}

/// A server listening on an ephemeral local port.
pub struct Running {
    pub server: Arc<MirrorServer>,
    pub addr: SocketAddr,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl Running {
    pub async fn start(server: Arc<MirrorServer>, config: MirrorConfig) -> Self {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn({
            let server = Arc::clone(&server);
            async move {
                server
                    .run("127.0.0.1:0".parse().unwrap(), config, Some(tx))
                    .await
            }
        });
        let addr = rx.await.expect("server did not start");

        Self {
            server,
            addr,
            handle,
        }
    }

    /// Shuts down and waits for the listener to stop.
    pub async fn stop(self) {
        self.server.shutdown().await;
        self.handle.await.unwrap().unwrap();
    }
}

/// The `repo` label of origin `i`.
pub fn repo_label(mirrors: &Mirrors, i: usize) -> Vec<Label> {
    vec![("repo", mirrors.origin_url(i).to_path())]
}

/// Polls `check` until it holds, failing after ten seconds.
pub async fn eventually(check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn file_url(path: &Path, domain: &str, owner: &str, name: &str) -> GitUrl {
    GitUrl::from_parts(
        Transport::File,
        format!("file://{}", path.display()),
        domain,
        owner,
        name,
    )
}

fn commit(repo: &Repository, refname: &str, file: &str, content: &str) -> Oid {
    let sig = Signature::now("Mirror Test", "test@example.com").unwrap();
    let blob = repo.blob(content.as_bytes()).unwrap();
    let mut builder = repo.treebuilder(None).unwrap();
    builder.insert(file, blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let parent = repo
        .find_reference(refname)
        .ok()
        .and_then(|r| r.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();

    repo.commit(Some(refname), &sig, &sig, content, &tree, &parents)
        .unwrap()
}

fn ref_target(repo: &Repository, refname: &str) -> Option<Oid> {
    repo.find_reference(refname).ok().and_then(|r| r.target())
}
