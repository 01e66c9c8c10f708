mod helpers;

use std::sync::Arc;

use helpers::fixtures::file_url;
use helpers::{FakeWebhooks, Mirrors, Running, eventually, post_hook, repo_label};
use pullmirror_core::{MirrorConfig, RepositoryConfig};
use pullmirror_server::metrics::names;
use pullmirror_server::{InMemoryObservability, UPDATE_ALL_ID};
use reqwest::StatusCode;

#[tokio::test]
async fn configure_builds_a_registry_keyed_by_owner_and_name() {
    let mirrors = Mirrors::new(1);
    let origin = file_url(&mirrors.origin_path(0), "host", "a", "b");
    let target = file_url(&mirrors.target_path(0), "host2", "a", "b");
    let config = MirrorConfig::new(vec![RepositoryConfig::new(origin, target)]).unwrap();
    let obs = Arc::new(InMemoryObservability::new());
    let server = mirrors.server(FakeWebhooks::new(), Arc::clone(&obs));

    server.configure(&config).await.unwrap();

    let status = server.status();
    assert!(status.ready);
    assert!(!status.running);
    assert_eq!(status.repositories.len(), 1);
    assert_eq!(status.repositories[0].origin().to_key(), "a/b");
    assert!(mirrors.mirrors_root().join("host/a/b").is_dir());
    assert!(obs.gauge(names::LAST_SUCCESSFUL_CONFIG_APPLY, &[]).is_some());
}

#[tokio::test]
async fn failed_configure_keeps_the_previous_registry() {
    let mirrors = Mirrors::new(2);
    let server = mirrors.server(FakeWebhooks::new(), Arc::new(InMemoryObservability::new()));
    server.configure(&mirrors.config_of(&[0])).await.unwrap();

    mirrors.remove_origin(1);
    let err = server.configure(&mirrors.config()).await.unwrap_err();

    assert_eq!(err.failures().len(), 1);
    assert_eq!(err.failures()[0].origin, mirrors.origin_url(1).to_path());
    let status = server.status();
    assert!(status.ready);
    assert_eq!(status.repositories.len(), 1);
    assert_eq!(status.repositories[0].origin().to_key(), mirrors.key(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_configure_passes_both_succeed() {
    for _ in 0..5 {
        let mirrors = Mirrors::new(4);
        let server = mirrors.server(FakeWebhooks::new(), Arc::new(InMemoryObservability::new()));
        let config = mirrors.config();

        let (first, second) = tokio::join!(server.configure(&config), server.configure(&config));

        first.unwrap();
        second.unwrap();
        assert!(server.status().ready);
        assert_eq!(server.status().repositories.len(), 4);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn later_configure_pass_wins() {
    let mirrors = Mirrors::new(3);
    let server = mirrors.server(FakeWebhooks::new(), Arc::new(InMemoryObservability::new()));
    let full = mirrors.config();
    let single = mirrors.config_of(&[2]);

    let (first, second) = tokio::join!(server.configure(&full), async {
        tokio::task::yield_now().await;
        server.configure(&single).await
    });

    first.unwrap();
    second.unwrap();
    let status = server.status();
    assert_eq!(status.repositories.len(), 1);
    assert_eq!(status.repositories[0].origin().to_key(), mirrors.key(2));
}

#[tokio::test]
async fn reload_swaps_the_registry() {
    let mirrors = Mirrors::new(2);
    let running = Running::start(
        mirrors.server(FakeWebhooks::new(), Arc::new(InMemoryObservability::new())),
        mirrors.config_of(&[0]),
    )
    .await;
    assert_eq!(post_hook(running.addr, &mirrors.key(1)).await, StatusCode::NOT_FOUND);

    running.server.configure(&mirrors.config_of(&[1])).await.unwrap();

    assert_eq!(post_hook(running.addr, &mirrors.key(0)).await, StatusCode::NOT_FOUND);
    assert_eq!(post_hook(running.addr, &mirrors.key(1)).await, StatusCode::ACCEPTED);
    eventually(|| mirrors.is_mirrored(1)).await;

    running.stop().await;
}

#[tokio::test]
async fn failed_initial_configure_still_listens() {
    let mirrors = Mirrors::new(1);
    mirrors.remove_origin(0);
    let running = Running::start(
        mirrors.server(FakeWebhooks::new(), Arc::new(InMemoryObservability::new())),
        mirrors.config(),
    )
    .await;

    let status = running.server.status();
    assert!(status.running);
    assert!(!status.ready);
    assert_eq!(
        post_hook(running.addr, &mirrors.key(0)).await,
        StatusCode::SERVICE_UNAVAILABLE
    );

    running.server.configure(&MirrorConfig::empty()).await.unwrap();
    assert!(running.server.status().ready);
    assert_eq!(post_hook(running.addr, &mirrors.key(0)).await, StatusCode::NOT_FOUND);

    running.stop().await;
}

#[tokio::test]
async fn shutdown_waits_for_accepted_hooks() {
    let mirrors = Mirrors::new(3);
    let obs = Arc::new(InMemoryObservability::new());
    let running = Running::start(
        mirrors.server(FakeWebhooks::new(), Arc::clone(&obs)),
        mirrors.config(),
    )
    .await;
    let addr = running.addr;

    for i in 0..3 {
        assert_eq!(post_hook(addr, &mirrors.key(i)).await, StatusCode::ACCEPTED);
    }
    let server = Arc::clone(&running.server);
    running.stop().await;

    for i in 0..3 {
        assert_eq!(obs.counter(names::HOOKS_UPDATED, &repo_label(&mirrors, i)), 1);
        assert!(mirrors.is_mirrored(i));
    }
    assert!(!server.status().running);
    assert_eq!(obs.gauge(names::SERVER_UP, &[]), Some(0.0));
}

#[tokio::test]
async fn hooks_are_rejected_after_shutdown_starts() {
    let mirrors = Mirrors::new(1);
    let server = mirrors.server(FakeWebhooks::new(), Arc::new(InMemoryObservability::new()));
    let running = Running::start(Arc::clone(&server), mirrors.config()).await;
    let addr = running.addr;
    assert!(running.server.observability().render().contains("server_up 1"));

    running.stop().await;

    assert!(reqwest::Client::new()
        .post(format!("http://{addr}/webhook"))
        .form(&[("payload", mirrors.key(0))])
        .send()
        .await
        .is_err());
    server.update_all().await;
}

#[tokio::test]
async fn update_all_before_ready_does_nothing() {
    let mirrors = Mirrors::new(1);
    let obs = Arc::new(InMemoryObservability::new());
    let server = mirrors.server(FakeWebhooks::new(), Arc::clone(&obs));

    server.update_all().await;

    assert_eq!(obs.counter(names::HOOKS_UPDATED, &repo_label(&mirrors, 0)), 0);
    assert_eq!(mirrors.target_main(0), None);
}

#[tokio::test]
async fn update_all_mirrors_every_repository() {
    let mirrors = Mirrors::new(2);
    let obs = Arc::new(InMemoryObservability::new());
    let running = Running::start(
        mirrors.server(FakeWebhooks::new(), Arc::clone(&obs)),
        mirrors.config(),
    )
    .await;

    running.server.update_all().await;

    eventually(|| mirrors.is_mirrored(0) && mirrors.is_mirrored(1)).await;
    assert_eq!(obs.counter(names::HOOKS_RECEIVED, &[]), 0);
    assert_eq!(UPDATE_ALL_ID, "update-all");

    running.stop().await;
}

#[tokio::test]
async fn overlapping_update_all_runs_both_passes() {
    let mirrors = Mirrors::new(1);
    let obs = Arc::new(InMemoryObservability::new());
    let running = Running::start(
        mirrors.server(FakeWebhooks::new(), Arc::clone(&obs)),
        mirrors.config(),
    )
    .await;
    let label = repo_label(&mirrors, 0);

    tokio::join!(running.server.update_all(), running.server.update_all());

    eventually(|| obs.counter(names::HOOKS_UPDATED, &label) == 2).await;
    assert_eq!(obs.gauge(names::REPOSITORY_UP, &label), Some(1.0));
    assert!(mirrors.is_mirrored(0));

    running.stop().await;
}

#[tokio::test]
async fn reserved_callback_paths_are_rejected() {
    use async_trait::async_trait;
    use pullmirror_core::GitUrl;
    use pullmirror_webhooks::{WebhookClient, WebhookError};

    struct MetricsCallback;

    #[async_trait]
    impl WebhookClient for MetricsCallback {
        async fn register_webhook(&self, _url: &GitUrl) -> Result<(), WebhookError> {
            Ok(())
        }

        fn parse_hook_payload(&self, payload: &str) -> Result<String, WebhookError> {
            Ok(payload.to_string())
        }

        fn callback_url(&self) -> &str {
            "http://mirror.test/metrics"
        }
    }

    let mirrors = Mirrors::new(0);
    let server = pullmirror_server::MirrorServer::new(
        mirrors.options(),
        Arc::new(MetricsCallback),
        Arc::new(InMemoryObservability::new()),
    )
    .unwrap();

    let result = server
        .run("127.0.0.1:0".parse().unwrap(), MirrorConfig::empty(), None)
        .await;
    assert!(matches!(
        result,
        Err(pullmirror_server::ServerError::InvalidCallbackUrl { .. })
    ));
}
