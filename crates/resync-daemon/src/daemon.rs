use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use resync_core::ResyncConfig;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::{AppState, Components};
use crate::http;

type ServerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Run until SIGINT/SIGTERM. SIGHUP reloads the config file and restarts the
/// scheduler with freshly built collaborators.
pub async fn run(conf: PathBuf, config: ResyncConfig) -> anyhow::Result<()> {
    let mut components = Components::build(config)?;
    let mut hangup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut interrupt = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;

    let state = Arc::new(AppState::new(components.store.clone()));
    let shutdown = CancellationToken::new();

    // The listener is bound once; a reload keeps the original address.
    let mut server: ServerFuture = match &components.config.http {
        Some(http_config) => {
            let handle = http::serve(http_config, state.clone(), shutdown.clone()).await?;
            Box::pin(async move {
                handle
                    .await
                    .context("health server task")?
                    .context("health server")
            })
        }
        None => Box::pin(std::future::pending()),
    };

    if let Err(e) = components.scheduler.start() {
        shutdown.cancel();
        return Err(e.into());
    }
    info!(conf = %conf.display(), "resync started");

    let result = loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("received SIGHUP, reloading configuration");
                if let Err(e) = reload(&conf, &mut components, &state).await {
                    error!(error = %e, "no configuration could be started");
                    break Err(e);
                }
            }
            _ = terminate.recv() => {
                warn!("received SIGTERM, exiting");
                break Ok(());
            }
            _ = interrupt.recv() => {
                warn!("received SIGINT, exiting");
                break Ok(());
            }
            res = &mut server => {
                error!("health server stopped unexpectedly");
                break res.and_then(|()| Err(anyhow::anyhow!("health server exited")));
            }
        }
    };

    components.scheduler.stop().await;
    shutdown.cancel();
    info!("resync stopped");
    result
}

/// Stop the running generation and replace it with one built from `conf`.
///
/// When the new config cannot be loaded, built or started, the previous
/// generation is started again and `Ok` is returned. `Err` only when even
/// that restart fails.
pub(crate) async fn reload(
    conf: &Path,
    components: &mut Components,
    state: &AppState,
) -> anyhow::Result<()> {
    components.scheduler.stop().await;

    match build(conf) {
        Ok(next) => match next.scheduler.start() {
            Ok(()) => {
                state.set_store(next.store.clone());
                *components = next;
                info!("configuration reloaded");
                return Ok(());
            }
            Err(e) => error!(error = %e, "new configuration failed to start, keeping the previous one"),
        },
        Err(e) => error!(error = %e, "reload failed, keeping the previous configuration"),
    }

    components
        .scheduler
        .start()
        .context("restarting the previous configuration")
}

fn build(conf: &Path) -> anyhow::Result<Components> {
    let config = ResyncConfig::load(conf).with_context(|| format!("loading {}", conf.display()))?;
    Components::build(config)
}
