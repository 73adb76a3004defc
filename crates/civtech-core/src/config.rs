//! Configuration loading and typed config structures for civtech clients.
//!
//! The canonical configuration lives in `civtech-config.yaml` at the
//! project root. Every field has a default, so an empty file (or no file)
//! is a valid configuration pointing at a local Dragonfly.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Env {
        /// The environment variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration.
///
/// Mirrors the structure of `civtech-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Record store connection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Challenge parameters and reveal timing.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DRAGONFLY_URL` overrides `store.url`
    /// - `CIVTECH_STORE_ADDRESS` overrides `store.contract_address`
    /// - `CIVTECH_CHAIN_ID` overrides `auth.chain_id`
    /// - `CIVTECH_LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Env`] if an override is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Env`] if an override is malformed.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without consulting the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its
    /// value if set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if `CIVTECH_CHAIN_ID` is not an
    /// unsigned integer.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("DRAGONFLY_URL") {
            self.store.url = val;
        }
        if let Some(val) = lookup("CIVTECH_STORE_ADDRESS") {
            self.store.contract_address = val;
        }
        if let Some(val) = lookup("CIVTECH_CHAIN_ID") {
            self.auth.chain_id =
                val.trim()
                    .parse()
                    .map_err(move |e: std::num::ParseIntError| {
                        tracing::debug!(error = %e, "rejecting CIVTECH_CHAIN_ID");
                        ConfigError::Env {
                            var: "CIVTECH_CHAIN_ID",
                            value: val,
                        }
                    })?;
        }
        if let Some(val) = lookup("CIVTECH_LOG_LEVEL") {
            self.logging.level = val;
        }
        Ok(())
    }
}

/// Which store backend to connect to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// A Redis-compatible `Dragonfly` instance at `store.url`.
    #[default]
    Dragonfly,
    /// An empty in-process store, lost on exit.
    Memory,
}

/// Record store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Backend to use.
    #[serde(default)]
    pub backend: StoreKind,

    /// `Dragonfly` connection URL.
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Address of the record store, signed into every challenge.
    #[serde(default = "default_contract_address")]
    pub contract_address: String,

    /// Upper bound on any single store call, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl StoreConfig {
    /// The store timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::default(),
            url: default_store_url(),
            contract_address: default_contract_address(),
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

/// Challenge and reveal configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    /// Active network id signed into every challenge.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Days a signed challenge stays valid.
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,

    /// Upper bound on waiting for the identity to sign, in milliseconds.
    #[serde(default = "default_sign_timeout_ms")]
    pub sign_timeout_ms: u64,

    /// Simulated decryption round trip, in milliseconds.
    #[serde(default = "default_reveal_latency_ms")]
    pub reveal_latency_ms: u64,

    /// Upper bound on the decryption round trip, in milliseconds.
    #[serde(default = "default_reveal_timeout_ms")]
    pub reveal_timeout_ms: u64,
}

impl AuthConfig {
    /// Signing timeout as a [`Duration`].
    pub const fn sign_timeout(&self) -> Duration {
        Duration::from_millis(self.sign_timeout_ms)
    }

    /// Decryption latency as a [`Duration`].
    pub const fn reveal_latency(&self) -> Duration {
        Duration::from_millis(self.reveal_latency_ms)
    }

    /// Decryption timeout as a [`Duration`].
    pub const fn reveal_timeout(&self) -> Duration {
        Duration::from_millis(self.reveal_timeout_ms)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            duration_days: default_duration_days(),
            sign_timeout_ms: default_sign_timeout_ms(),
            reveal_latency_ms: default_reveal_latency_ms(),
            reveal_timeout_ms: default_reveal_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (required by serde `default = "..."`)
// ---------------------------------------------------------------------------

fn default_store_url() -> String {
    String::from("redis://localhost:6379")
}

fn default_contract_address() -> String {
    String::from("0x0000000000000000000000000000000000000000")
}

const fn default_store_timeout_ms() -> u64 {
    5_000
}

const fn default_chain_id() -> u64 {
    31_337
}

const fn default_duration_days() -> u32 {
    30
}

const fn default_sign_timeout_ms() -> u64 {
    120_000
}

const fn default_reveal_latency_ms() -> u64 {
    1_500
}

const fn default_reveal_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    String::from("info")
}
