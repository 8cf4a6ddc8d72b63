//! Configuration loading and representation.
//!
//! Sources, later overriding earlier:
//! 1. `config/warden.yaml` (or the file named by `WARDEN_CONFIG`)
//! 2. environment variables `WARDEN_<SECTION>__<KEY>`, e.g. `WARDEN_JWT__SECRET`

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_auth::{HashCost, TokenCodec};
use warden_observability::{LogFormat, LogSettings};

pub const CONFIG_PATH_ENV: &str = "WARDEN_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/warden.yaml";
const ENV_PREFIX: &str = "WARDEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime mode. Selects the default log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Debug,
    Release,
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: String,
    pub mode: ServerMode,
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            mode: ServerMode::Debug,
            shutdown_timeout_secs: 5,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    pub secret: String,
    pub ttl_secs: u64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_secs: 24 * 60 * 60,
        }
    }
}

impl core::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Falls back to the mode default: pretty in debug, JSON otherwise.
    pub format: Option<LogFormat>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Model file. The embedded default model is used when unset.
    pub model_path: Option<PathBuf>,
    pub rules_path: PathBuf,
    /// Seconds between rule file checks; 0 disables watching.
    pub watch_interval_secs: u64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            model_path: None,
            rules_path: PathBuf::from("config/policy.csv"),
            watch_interval_secs: 5,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_role: String,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            admin_username: None,
            admin_password: None,
            admin_role: "admin".to_string(),
        }
    }
}

impl core::fmt::Debug for BootstrapSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapSettings")
            .field("admin_username", &self.admin_username)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .field("admin_role", &self.admin_role)
            .finish()
    }
}

/// One immutable configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub jwt: JwtSettings,
    pub log: LogConfig,
    pub policy: PolicySettings,
    pub password: HashCost,
    pub bootstrap: BootstrapSettings,
    /// Seconds between config file checks; 0 disables watching.
    pub watch_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            jwt: JwtSettings::default(),
            log: LogConfig::default(),
            policy: PolicySettings::default(),
            password: HashCost::default(),
            bootstrap: BootstrapSettings::default(),
            watch_interval_secs: 5,
        }
    }
}

impl Settings {
    /// Path of the config file: `$WARDEN_CONFIG` or the default.
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load and validate. A missing file is not an error; env vars alone
    /// can configure everything.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.jwt.secret.is_empty() {
            return invalid("jwt.secret must be set");
        }
        let max_ttl = u64::try_from(TokenCodec::MAX_TTL_DAYS * 24 * 60 * 60).unwrap_or(u64::MAX);
        if self.jwt.ttl_secs == 0 || self.jwt.ttl_secs > max_ttl {
            return invalid("jwt.ttl_secs must be between 1 and 366 days");
        }
        if self.server.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "server.addr `{}` is not a socket address",
                self.server.addr
            )));
        }
        if self.password.memory_kib == 0 || self.password.iterations == 0 || self.password.parallelism == 0 {
            return invalid("password cost parameters must be positive");
        }
        if self.log.level.trim().is_empty() {
            return invalid("log.level must not be empty");
        }
        if self.bootstrap.admin_role.trim().is_empty() {
            return invalid("bootstrap.admin_role must not be empty");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .addr
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.addr `{}`", self.server.addr)))
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.jwt.ttl_secs).unwrap_or(i64::MAX / 1000))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    pub fn log_settings(&self) -> LogSettings {
        let format = self.log.format.unwrap_or(match self.server.mode {
            ServerMode::Debug => LogFormat::Pretty,
            ServerMode::Release | ServerMode::Test => LogFormat::Json,
        });
        LogSettings {
            level: self.log.level.clone(),
            format,
        }
    }

    /// Whether a new snapshot needs a different token codec.
    pub fn token_changed(&self, other: &Settings) -> bool {
        self.jwt != other.jwt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> Settings {
        Settings {
            jwt: JwtSettings {
                secret: "a-test-secret-that-is-long-enough-for-hs256".into(),
                ttl_secs: 3600,
            },
            ..Settings::default()
        }
    }

    #[test]
    fn defaults_need_only_a_secret() {
        assert!(valid().validate().is_ok());
        assert!(matches!(Settings::default().validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_bad_values() {
        let mut s = valid();
        s.jwt.ttl_secs = 0;
        assert!(s.validate().is_err());

        let mut s = valid();
        s.server.addr = "not-an-address".into();
        assert!(s.validate().is_err());

        let mut s = valid();
        s.password.iterations = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn log_format_follows_mode_unless_set() {
        let mut s = valid();
        assert_eq!(s.log_settings().format, LogFormat::Pretty);
        s.server.mode = ServerMode::Release;
        assert_eq!(s.log_settings().format, LogFormat::Json);
        s.log.format = Some(LogFormat::Pretty);
        assert_eq!(s.log_settings().format, LogFormat::Pretty);
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "server:\n  addr: \"127.0.0.1:9000\"\n  mode: release\njwt:\n  secret: from-file-secret\n  ttl_secs: 60\nlog:\n  level: debug\n"
        )
        .unwrap();

        let s = Settings::load_from(file.path()).unwrap();
        assert_eq!(s.server.addr, "127.0.0.1:9000");
        assert_eq!(s.server.mode, ServerMode::Release);
        assert_eq!(s.jwt.secret, "from-file-secret");
        assert_eq!(s.token_ttl(), chrono::Duration::seconds(60));
        assert_eq!(s.log.level, "debug");
        assert_eq!(s.policy.rules_path, PathBuf::from("config/policy.csv"));
    }

    #[test]
    fn secrets_are_not_debug_printed() {
        let mut s = valid();
        s.bootstrap.admin_password = Some("hunter2".into());
        let debug = format!("{s:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("long-enough"));
    }
}
