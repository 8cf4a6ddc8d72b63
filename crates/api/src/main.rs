use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use warden_api::app::{self, AppState};
use warden_api::config::Settings;
use warden_api::{server, watch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = Settings::config_path();
    let settings = Settings::load_from(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    let log = warden_observability::init(&settings.log_settings()).context("initializing logging")?;
    warden_observability::install_panic_hook();
    tracing::info!(
        config = %config_path.display(),
        mode = ?settings.server.mode,
        "starting warden"
    );

    let state = AppState::build(&settings)
        .await
        .context("building application state")?;
    let settings = Arc::new(settings);
    let shutdown = CancellationToken::new();

    let snapshots = watch::spawn_config_watcher(
        config_path,
        settings.clone(),
        Duration::from_secs(settings.watch_interval_secs),
        shutdown.clone(),
    );
    watch::spawn_settings_subscriber(snapshots, state.tokens.clone(), Some(log), shutdown.clone());
    watch::spawn_policy_watcher(
        settings.policy.rules_path.clone(),
        Duration::from_secs(settings.policy.watch_interval_secs),
        state.enforcer.clone(),
        shutdown.clone(),
    );

    let addr = settings.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            server::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    server::serve(listener, app::router(state), shutdown, settings.shutdown_timeout()).await
}
