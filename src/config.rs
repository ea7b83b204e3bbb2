//! Configuration management for dnsreconcile
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all run settings. It uses the `figment` crate to
//! layer defaults, an optional TOML file, `DNSRECONCILE_` environment
//! variables and command-line flags, in that order.

use crate::checker::CheckConfig;
use crate::cli::Cli;
use crate::core::RecordType;
use crate::inventory::Credentials;
use crate::probe::{ProbeBackend, ResolverTarget};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    MissingFile(PathBuf),

    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),

    #[error("missing {0} connection string")]
    MissingEndpoint(&'static str),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// What the run does with the probed answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Pass/fail gate: retry and classify every pair.
    Check,
    /// Report-only audit: log both answers once per pair.
    Normal,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check" => Ok(Mode::Check),
            "normal" => Ok(Mode::Normal),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("expected 'user:password@dataHost/resolveHost', got '{0}'")]
    Malformed(String),
    #[error("empty {0}")]
    Empty(&'static str),
    #[error("invalid resolve host: {0}")]
    ResolveHost(String),
}

/// A platform's connection settings, written `user:password@dataHost/resolveHost`.
///
/// `dataHost` serves the management API; `resolveHost` answers DNS queries.
/// Without `/resolveHost` the data host is used for both.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    pub username: String,
    pub password: String,
    pub data_host: String,
    pub resolve_host: ResolverTarget,
}

impl Endpoint {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (credentials, hosts) = s
            .rsplit_once('@')
            .ok_or_else(|| EndpointError::Malformed(redact(s)))?;
        let (username, password) = credentials
            .split_once(':')
            .ok_or_else(|| EndpointError::Malformed(redact(s)))?;
        if username.is_empty() {
            return Err(EndpointError::Empty("user name"));
        }

        let (data_host, resolve_host) = match hosts.split_once('/') {
            Some((data, resolve)) => (data.trim(), resolve.trim()),
            None => (hosts.trim(), hosts.trim()),
        };
        if data_host.is_empty() {
            return Err(EndpointError::Empty("data host"));
        }
        if resolve_host.is_empty() {
            return Err(EndpointError::Empty("resolve host"));
        }
        let resolve_host = resolve_host
            .parse::<ResolverTarget>()
            .map_err(|e| EndpointError::ResolveHost(e.to_string()))?;

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
            data_host: data_host.to_string(),
            resolve_host,
        })
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        format!(
            "{}:{}@{}/{}",
            value.username, value.password, value.data_host, value.resolve_host
        )
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("data_host", &self.data_host)
            .field("resolve_host", &self.resolve_host)
            .finish()
    }
}

/// Hides everything before the last '@' so errors never echo a password.
fn redact(s: &str) -> String {
    match s.rsplit_once('@') {
        Some((_, hosts)) => format!("<credentials>@{}", hosts),
        None => "<unparseable>".to_string(),
    }
}

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Filter for diagnostic logging on stderr (overridden by RUST_LOG).
    pub log_level: String,
    /// `check` or `normal`. Kept as text so an unknown mode is a run failure, not a usage error.
    pub mode: String,
    /// Source A (legacy traffic manager) connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_a: Option<Endpoint>,
    /// Source B (DNS management platform) connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_b: Option<Endpoint>,
    /// Inventory API settings.
    pub inventory: InventoryConfig,
    /// Reconciliation settings.
    pub check: CheckConfig,
    /// Resolution probe settings.
    pub probe: ProbeConfig,
    /// Worker pool and run limits.
    pub performance: PerformanceConfig,
    /// Report log settings.
    pub report: ReportConfig,
}

/// Settings for both platforms' inventory APIs.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct InventoryConfig {
    /// URL scheme for both APIs.
    pub scheme: String,
    /// Per-request timeout in seconds.
    pub request_timeout_seconds: u64,
    /// Skip TLS certificate verification. The appliances ship self-signed certificates.
    pub accept_invalid_certs: bool,
    /// Source A's wide-IP collection root.
    pub legacy_path: String,
    /// Source B's API port.
    pub platform_port: u16,
    /// Source B's view holding the GSLB zones.
    pub platform_view: String,
    /// Page size requested from Source B.
    pub page_size: u64,
    /// Record type Source B's names are filed under.
    pub platform_record_type: RecordType,
}

/// Settings for resolution probes.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProbeConfig {
    pub backend: ProbeBackend,
    /// Path to the dig binary.
    pub dig_path: String,
    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Worker pool and run limits.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PerformanceConfig {
    /// Number of pairs probed concurrently.
    pub worker_concurrency: usize,
    /// Capacity of the pending-pair queue.
    pub queue_capacity: usize,
    /// Limit for the whole probe phase in seconds; 0 disables it.
    pub run_timeout_seconds: u64,
}

/// Settings for the durable report log.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReportConfig {
    pub path: PathBuf,
    /// Truncate the log at start instead of appending to it.
    pub truncate: bool,
}

impl Config {
    /// Loads the configuration, layering defaults, the optional file given
    /// with `--config`, `DNSRECONCILE_*` environment variables and CLI flags.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            if !path.exists() {
                return Err(ConfigError::MissingFile(path.clone()));
            }
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            // e.g. DNSRECONCILE_CHECK__RETRY_BUDGET=3
            .merge(Env::prefixed("DNSRECONCILE_").split("__"))
            .merge(cli)
            .extract()
            .map_err(Box::new)?;
        Ok(config)
    }

    /// Returns both connection settings, or the first one missing.
    pub fn endpoints(&self) -> Result<(&Endpoint, &Endpoint), ConfigError> {
        let source_a = self
            .source_a
            .as_ref()
            .ok_or(ConfigError::MissingEndpoint("Source A"))?;
        let source_b = self
            .source_b
            .as_ref()
            .ok_or(ConfigError::MissingEndpoint("Source B"))?;
        Ok((source_a, source_b))
    }

    /// Rejects settings the run cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoints()?;
        if self.performance.worker_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "performance.worker_concurrency must be at least 1".to_string(),
            ));
        }
        if self.check.record_types.is_empty() {
            return Err(ConfigError::Invalid(
                "check.record_types must name at least one record type".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            mode: "check".to_string(),
            source_a: None,
            source_b: None,
            inventory: InventoryConfig {
                scheme: "https".to_string(),
                request_timeout_seconds: 30,
                accept_invalid_certs: true,
                legacy_path: "/mgmt/tm/gtm/wideip".to_string(),
                platform_port: 20120,
                platform_view: "ADD".to_string(),
                page_size: 500,
                platform_record_type: RecordType::A,
            },
            check: CheckConfig::default(),
            probe: ProbeConfig {
                backend: ProbeBackend::Dig,
                dig_path: "dig".to_string(),
                timeout_ms: 5000,
            },
            performance: PerformanceConfig {
                worker_concurrency: 8,
                queue_capacity: 1024,
                run_timeout_seconds: 3600,
            },
            report: ReportConfig {
                path: PathBuf::from("dig.log"),
                truncate: true,
            },
        }
    }
}
