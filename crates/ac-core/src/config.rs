use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Policy, DEFAULT_COMMIT_FREQUENCY_HINT, DEFAULT_DETAIL_LEVEL_HINT};
use crate::vcs::{CommitIdentity, VcsBackendKind, VcsOptions};

/// Top-level configuration loaded from `~/.autocommit/config.toml`.
///
/// The oracle API key is never stored here; only the name of the environment
/// variable that holds it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub vcs: VcsConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic checks that the types alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "watch.debounce_ms must be greater than zero".into(),
            ));
        }
        if self.vcs.command_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "vcs.command_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "oracle.timeout_secs must be greater than zero".into(),
            ));
        }
        self.vcs.backend_kind()?;
        if self.vcs.author_name.is_some() != self.vcs.author_email.is_some() {
            return Err(ConfigError::Validation(
                "vcs.author_name and vcs.author_email must be set together".into(),
            ));
        }
        if self.bridge.enabled && self.bridge.port == 0 {
            return Err(ConfigError::Validation(
                "bridge.port must be non-zero when the bridge is enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".autocommit")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl WatchConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_debounce_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            command_timeout_secs: default_command_timeout_secs(),
            author_name: None,
            author_email: None,
        }
    }
}

impl VcsConfig {
    pub fn backend_kind(&self) -> Result<VcsBackendKind, ConfigError> {
        self.backend
            .parse()
            .map_err(|e: crate::vcs::VcsError| ConfigError::Validation(e.to_string()))
    }

    pub fn options(&self) -> VcsOptions {
        let identity = match (&self.author_name, &self.author_email) {
            (Some(name), Some(email)) => Some(CommitIdentity::new(name, email)),
            _ => None,
        };
        VcsOptions {
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            identity,
        }
    }
}

fn default_backend() -> String {
    "git".into()
}
fn default_command_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
    /// Verdict used when no API key is configured at all.
    #[serde(default = "default_offline_commit")]
    pub offline_commit: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_oracle_timeout_secs(),
            offline_commit: default_offline_commit(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_oracle_timeout_secs() -> u64 {
    20
}
fn default_offline_commit() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_commit_frequency_hint")]
    pub commit_frequency_hint: String,
    #[serde(default = "default_detail_level_hint")]
    pub detail_level_hint: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            commit_frequency_hint: default_commit_frequency_hint(),
            detail_level_hint: default_detail_level_hint(),
        }
    }
}

impl PolicyConfig {
    pub fn initial_policy(&self) -> Policy {
        Policy {
            commit_frequency_hint: self.commit_frequency_hint.clone(),
            detail_level_hint: self.detail_level_hint.clone(),
        }
    }
}

fn default_commit_frequency_hint() -> String {
    DEFAULT_COMMIT_FREQUENCY_HINT.into()
}
fn default_detail_level_hint() -> String {
    DEFAULT_DETAIL_LEVEL_HINT.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory of static files served next to the WebSocket endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_dir: Option<String>,
    /// Browser origins allowed besides loopback, e.g. a hosted dashboard.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            frontend_dir: None,
            allowed_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8765
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_true")]
    pub record_skips: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { record_skips: true }
    }
}
