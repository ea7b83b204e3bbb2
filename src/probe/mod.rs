//! Resolution probes.
//!
//! A probe is one live DNS query against a specific resolver. Two backends
//! implement [`Prober`]: the external `dig` command and an in-process
//! `hickory-resolver` client. Both hand back presentation-format answer text
//! for the normalizer.

pub mod dig;
pub mod resolver;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::core::Prober;
pub use dig::DigProber;
pub use resolver::HickoryProber;

use crate::answer::ParseError;
use crate::config::ProbeConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DNS_PORT: u16 = 53;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("could not run '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("dig exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("resolver {target} is unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("DNS query failed: {0}")]
    Resolution(String),

    #[error("resolver returned no answer records")]
    NoData,

    #[error("malformed answer: {0}")]
    Malformed(#[from] ParseError),
}

/// Which probe implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProbeBackend {
    /// Run the external `dig` command.
    #[default]
    Dig,
    /// Query in-process with hickory-resolver.
    Hickory,
}

impl ProbeBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeBackend::Dig => "dig",
            ProbeBackend::Hickory => "hickory",
        }
    }
}

/// A resolver to probe: a host name or IP address plus port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverTarget {
    pub host: String,
    pub port: u16,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid resolver address '{0}'")]
pub struct InvalidResolverTarget(pub String);

impl ResolverTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The host as an IP address, if it is one.
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }
}

impl FromStr for ResolverTarget {
    type Err = InvalidResolverTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InvalidResolverTarget(s.to_string()));
        }
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Self::new(addr.ip().to_string(), addr.port()));
        }
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::new(ip.to_string(), DEFAULT_DNS_PORT));
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| InvalidResolverTarget(s.to_string()))?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(InvalidResolverTarget(s.to_string())),
            None => Ok(Self::new(s, DEFAULT_DNS_PORT)),
        }
    }
}

impl fmt::Display for ResolverTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ip(), self.port) {
            (_, DEFAULT_DNS_PORT) => f.write_str(&self.host),
            (Some(IpAddr::V6(ip)), port) => write!(f, "[{}]:{}", ip, port),
            (_, port) => write!(f, "{}:{}", self.host, port),
        }
    }
}

/// Builds the configured probe backend.
pub fn build_prober(config: &ProbeConfig) -> Arc<dyn Prober> {
    let timeout = Duration::from_millis(config.timeout_ms);
    match config.backend {
        ProbeBackend::Dig => Arc::new(DigProber::new(config.dig_path.clone(), timeout)),
        ProbeBackend::Hickory => Arc::new(HickoryProber::new(timeout)),
    }
}
