//! git-pull-mirror binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pullmirror_core::MirrorConfig;
use pullmirror_server::cli::Args;
use pullmirror_server::metrics::init_metrics;
use pullmirror_server::{MirrorServer, Observability, PrometheusObservability};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut debug_enabled = args.debug;
    let filter = init_tracing(debug_enabled);

    args.validate()?;
    info!(
        "starting git-pull-mirror v{}",
        pullmirror_server::version()
    );

    let handle = init_metrics().context("failed to install the metrics recorder")?;
    let observability: Arc<dyn Observability> = Arc::new(PrometheusObservability::new(handle));

    let config = MirrorConfig::load(&args.config_file).context("failed to load configuration")?;
    let webhooks = args
        .webhook_client()
        .context("failed to create the webhooks client")?;
    let server = MirrorServer::new(args.server_options(), webhooks, observability)
        .context("mirror server failed to validate the configuration")?;

    if args.dry_run {
        info!(
            "dry run: configuration with {} repositories is valid",
            config.len()
        );
        return Ok(());
    }

    let addr = args.listen_addr()?;
    let mut run = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run(addr, config, None).await }
    });

    let mut hangup = signal(SignalKind::hangup())?;
    let mut user1 = signal(SignalKind::user_defined1())?;
    let mut user2 = signal(SignalKind::user_defined2())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            result = &mut run => {
                // The listener stopped without a shutdown request.
                result??;
                return Ok(());
            }
            _ = hangup.recv() => {
                info!("reloading the configuration");
                match MirrorConfig::load(&args.config_file) {
                    Ok(config) => {
                        if let Err(e) = server.configure(&config).await {
                            error!("{e}");
                        }
                    }
                    Err(e) => error!("failed to load configuration: {e}"),
                }
            }
            _ = user1.recv() => {
                debug_enabled = !debug_enabled;
                info!(debug_enabled, "toggling debug log level");
                if let Err(e) = filter.reload(level_filter(debug_enabled)) {
                    error!("failed to change the log level: {e}");
                }
            }
            _ = user2.recv() => {
                info!("received USR2, forcing an update in all the repositories");
                let server = Arc::clone(&server);
                tokio::spawn(async move { server.update_all().await });
            }
            _ = interrupt.recv() => break,
            _ = terminate.recv() => break,
        }
    }

    info!("shutting down gracefully");
    server.shutdown().await;
    run.await??;
    Ok(())
}

fn level_filter(debug_enabled: bool) -> EnvFilter {
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn init_tracing(debug_enabled: bool) -> FilterHandle {
    let (filter, handle) = reload::Layer::new(level_filter(debug_enabled));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}
