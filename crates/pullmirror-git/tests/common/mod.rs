//! Local bare repositories standing in for origins and targets.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use git2::{Commit, Oid, Repository, Signature};
use pullmirror_core::{GitUrl, Transport};
use pullmirror_git::{GitClient, GitClientConfig, PushBackoff};
use tempfile::TempDir;

/// A scratch area with an origin, a target, and a mirrors root.
pub struct Fixture {
    pub dir: TempDir,
    pub origin: Repository,
    pub origin_path: PathBuf,
    pub target_path: PathBuf,
}

impl Fixture {
    /// Creates an origin with one commit on `main` and an empty target.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let origin_path = dir.path().join("remotes/origin.git");
        let target_path = dir.path().join("remotes/target.git");

        let origin = Repository::init_bare(&origin_path).unwrap();
        commit(&origin, "refs/heads/main", "README.md", "hello");
        origin.set_head("refs/heads/main").unwrap();
        Repository::init_bare(&target_path).unwrap();

        Self {
            dir,
            origin,
            origin_path,
            target_path,
        }
    }

    pub fn mirrors_root(&self) -> PathBuf {
        self.dir.path().join("mirrors")
    }

    pub fn client(&self) -> Arc<GitClient> {
        let config = GitClientConfig::builder()
            .repositories_path(self.mirrors_root())
            .timeout(Duration::from_secs(30))
            .push_backoff(PushBackoff::new(
                Duration::from_millis(5),
                Duration::from_millis(20),
                3,
            ))
            .build()
            .unwrap();
        Arc::new(GitClient::new(config))
    }

    pub fn origin_url(&self) -> GitUrl {
        file_url(&self.origin_path, "acme", "widgets")
    }

    pub fn target_url(&self) -> GitUrl {
        file_url(&self.target_path, "mirror", "widgets")
    }

    pub fn target(&self) -> Repository {
        Repository::open_bare(&self.target_path).unwrap()
    }
}

pub fn file_url(path: &Path, owner: &str, name: &str) -> GitUrl {
    GitUrl::from_parts(
        Transport::File,
        format!("file://{}", path.display()),
        "localhost",
        owner,
        name,
    )
}

/// Commits a single file on top of `refname`, creating the ref if needed.
pub fn commit(repo: &Repository, refname: &str, file: &str, content: &str) -> Oid {
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

/// Returns the object a ref points at, if the ref exists.
pub fn ref_target(repo: &Repository, refname: &str) -> Option<Oid> {
    repo.find_reference(refname).ok().and_then(|r| r.target())
}
