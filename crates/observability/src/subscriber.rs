//! Tracing subscriber initialization.
//!
//! JSON lines by default, human-readable output on request. The level filter
//! sits behind a reload layer so a new configuration snapshot can change it
//! without restarting. `RUST_LOG`, when set, wins over the configured level.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. `info` or `info,warden_api=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid log filter `{directive}`: {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("global tracing subscriber already installed")]
    AlreadyInitialized,

    #[error("failed to swap log filter: {0}")]
    Reload(String),
}

/// Handle for changing the active filter at runtime.
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
}

impl LogHandle {
    /// Replace the level directive. A no-op while `RUST_LOG` is in charge.
    pub fn set_level(&self, directive: &str) -> Result<(), ObservabilityError> {
        if self.env_override {
            tracing::debug!(directive, "RUST_LOG is set; ignoring configured log level");
            return Ok(());
        }
        let filter = parse_filter(directive)?;
        self.filter
            .reload(filter)
            .map_err(|e| ObservabilityError::Reload(e.to_string()))?;
        tracing::info!(directive, "log level changed");
        Ok(())
    }
}

impl core::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LogHandle")
            .field("env_override", &self.env_override)
            .finish_non_exhaustive()
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(settings: &LogSettings) -> Result<LogHandle, ObservabilityError> {
    let rust_log = std::env::var("RUST_LOG").ok().filter(|v| !v.trim().is_empty());
    let env_override = rust_log.is_some();
    let filter = parse_filter(rust_log.as_deref().unwrap_or(&settings.level))?;

    let (filter_layer, handle) = reload::Layer::new(filter);

    let (json, pretty) = match settings.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_timer(fmt::time::SystemTime)
                    .with_target(false),
            ),
            None,
        ),
        LogFormat::Pretty => (None, Some(fmt::layer().with_target(true))),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(json)
        .with(pretty)
        .try_init()
        .map_err(|_| ObservabilityError::AlreadyInitialized)?;

    Ok(LogHandle {
        filter: handle,
        env_override,
    })
}

fn parse_filter(directive: &str) -> Result<EnvFilter, ObservabilityError> {
    EnvFilter::try_new(directive).map_err(|e| ObservabilityError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}
