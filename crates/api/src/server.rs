//! Listener loop with graceful shutdown.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve `app` until `shutdown` fires, then give in-flight requests `grace`
/// to finish before dropping the remaining connections.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("reading listener address")?;
    tracing::info!(%addr, "listening");

    let signal = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
    });

    tokio::select! {
        joined = &mut server => {
            return joined.context("server task panicked")?.context("server error");
        }
        _ = shutdown.cancelled() => {}
    }

    tracing::info!(grace_secs = grace.as_secs(), "shutting down; draining in-flight requests");
    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => {
            joined.context("server task panicked")?.context("server error")?;
            tracing::info!("server stopped");
        }
        Err(_) => {
            tracing::warn!("grace period elapsed; closing remaining connections");
            server.abort();
        }
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
