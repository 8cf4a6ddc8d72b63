//! Background pollers for the configuration file and the policy rules file.
//!
//! Change detection is modification-time polling. A new configuration
//! snapshot is published on a `watch` channel only after it validates; the
//! previous snapshot stays in effect otherwise.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use warden_auth::{SharedTokenCodec, TokenCodec};
use warden_observability::LogHandle;
use warden_policy::Enforcer;

use crate::config::Settings;

/// Tracks one file's modification time between polls.
#[derive(Debug)]
struct FileStamp {
    path: PathBuf,
    last: Option<SystemTime>,
}

impl FileStamp {
    async fn new(path: PathBuf) -> Self {
        let last = modified(&path).await;
        Self { path, last }
    }

    /// True when the modification time differs from the previous poll.
    async fn changed(&mut self) -> bool {
        let current = modified(&self.path).await;
        if current == self.last {
            return false;
        }
        self.last = current;
        true
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// Calls `on_change` whenever `path` changes, until `shutdown` fires.
async fn poll_file<F, Fut>(path: PathBuf, every: Duration, shutdown: CancellationToken, mut on_change: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut stamp = FileStamp::new(path).await;
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if stamp.changed().await {
            on_change().await;
        }
    }
    tracing::debug!(path = %stamp.path.display(), "file watcher stopped");
}

/// Start polling the configuration file. A zero interval disables polling and
/// the receiver only ever holds `initial`.
pub fn spawn_config_watcher(
    path: PathBuf,
    initial: Arc<Settings>,
    every: Duration,
    shutdown: CancellationToken,
) -> watch::Receiver<Arc<Settings>> {
    let (tx, rx) = watch::channel(initial);
    if every.is_zero() {
        tracing::info!("configuration watching disabled");
        return rx;
    }

    tracing::info!(path = %path.display(), interval_secs = every.as_secs(), "watching configuration");
    tokio::spawn(async move {
        poll_file(path.clone(), every, shutdown, || {
            publish_settings(&path, &tx);
            std::future::ready(())
        })
        .await;
    });
    rx
}

fn publish_settings(path: &Path, tx: &watch::Sender<Arc<Settings>>) {
    match Settings::load_from(path) {
        Ok(next) => {
            tracing::info!(path = %path.display(), "configuration reloaded");
            tx.send_replace(Arc::new(next));
        }
        Err(err) => tracing::warn!(
            error = %err,
            path = %path.display(),
            "configuration rejected; keeping previous snapshot"
        ),
    }
}

/// Apply every published snapshot to the live components.
pub fn spawn_settings_subscriber(
    mut rx: watch::Receiver<Arc<Settings>>,
    tokens: Arc<SharedTokenCodec>,
    log: Option<LogHandle>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut current = rx.borrow_and_update().clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = rx.changed() => if changed.is_err() { break },
            }
            let next = rx.borrow_and_update().clone();
            apply_settings(&current, &next, &tokens, log.as_ref());
            current = next;
        }
    })
}

/// Push the parts of `next` that can change at runtime. Everything else is
/// reported and takes effect on restart.
pub fn apply_settings(
    previous: &Settings,
    next: &Settings,
    tokens: &SharedTokenCodec,
    log: Option<&LogHandle>,
) {
    if previous.token_changed(next) {
        match TokenCodec::new(next.jwt.secret.as_bytes(), next.token_ttl()) {
            Ok(codec) => {
                tokens.replace(codec);
                tracing::info!(ttl_secs = next.jwt.ttl_secs, "token settings applied");
            }
            Err(err) => tracing::warn!(error = %err, "token settings rejected; keeping previous codec"),
        }
    }

    if previous.log.level != next.log.level {
        if let Some(handle) = log {
            if let Err(err) = handle.set_level(&next.log.level) {
                tracing::warn!(error = %err, "log level rejected");
            }
        }
    }

    let restart_only = [
        ("server", previous.server != next.server),
        ("policy", previous.policy != next.policy),
        ("password", previous.password != next.password),
        ("bootstrap", previous.bootstrap != next.bootstrap),
        ("log.format", previous.log.format != next.log.format),
        ("watch_interval_secs", previous.watch_interval_secs != next.watch_interval_secs),
    ];
    for (section, changed) in restart_only {
        if changed {
            tracing::warn!(section, "setting changed; takes effect after restart");
        }
    }
}

/// Reload the policy whenever the rules file changes. Zero disables polling.
pub fn spawn_policy_watcher(
    path: PathBuf,
    every: Duration,
    enforcer: Arc<dyn Enforcer>,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        tracing::info!("policy file watching disabled");
        return None;
    }

    tracing::info!(path = %path.display(), interval_secs = every.as_secs(), "watching policy rules");
    Some(tokio::spawn(poll_file(path, every, shutdown, move || {
        let enforcer = enforcer.clone();
        async move {
            if let Err(err) = enforcer.reload().await {
                tracing::error!(error = %err, "policy reload failed; keeping previous rules");
            }
        }
    })))
}
