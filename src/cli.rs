//! Command-Line Interface (CLI) argument parsing.
//!
//! Flags are parsed with `clap` and merged last into the configuration, on
//! top of the defaults, the optional TOML file and environment variables.

use crate::probe::ProbeBackend;
use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Reconciles the DNS inventory of a legacy traffic manager against its replacement platform.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source A connection: user:password@dataHost/resolveHost
    #[arg(short = 'f', long, value_name = "CONN")]
    pub source_a: Option<String>,

    /// Source B connection: user:password@dataHost/resolveHost
    #[arg(short = 'z', long, value_name = "CONN")]
    pub source_b: Option<String>,

    /// Run mode: `check` (pass/fail gate) or `normal` (report-only audit).
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra Source B probes allowed after a mismatch.
    #[arg(long, value_name = "N")]
    pub retry_budget: Option<u32>,

    /// Number of pairs probed concurrently.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Report log path.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Append to the report log instead of truncating it.
    #[arg(long)]
    pub append: bool,

    /// Compare answers without their TTLs.
    #[arg(long)]
    pub ignore_ttl: bool,

    /// Probe implementation.
    #[arg(long, value_enum, value_name = "BACKEND")]
    pub probe_backend: Option<ProbeBackend>,

    /// Per-probe timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    pub probe_timeout_ms: Option<u64>,

    /// Diagnostic log filter, e.g. `info` or `dnsreconcile=debug`.
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(source_a) = &self.source_a {
            insert(&mut dict, &["source_a"], Value::from(source_a.clone()));
        }
        if let Some(source_b) = &self.source_b {
            insert(&mut dict, &["source_b"], Value::from(source_b.clone()));
        }
        if let Some(mode) = &self.mode {
            insert(&mut dict, &["mode"], Value::from(mode.clone()));
        }
        if let Some(budget) = self.retry_budget {
            insert(&mut dict, &["check", "retry_budget"], Value::from(budget));
        }
        if let Some(concurrency) = self.concurrency {
            insert(
                &mut dict,
                &["performance", "worker_concurrency"],
                Value::from(concurrency),
            );
        }
        if let Some(path) = &self.log_file {
            insert(
                &mut dict,
                &["report", "path"],
                Value::from(path.to_string_lossy().into_owned()),
            );
        }
        // Boolean switches only override when given.
        if self.append {
            insert(&mut dict, &["report", "truncate"], Value::from(false));
        }
        if self.ignore_ttl {
            insert(&mut dict, &["check", "ttl_policy"], Value::from("ignore"));
        }
        if let Some(backend) = self.probe_backend {
            insert(&mut dict, &["probe", "backend"], Value::from(backend.as_str()));
        }
        if let Some(timeout) = self.probe_timeout_ms {
            insert(&mut dict, &["probe", "timeout_ms"], Value::from(timeout));
        }
        if let Some(level) = &self.log_level {
            insert(&mut dict, &["log_level"], Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

/// Inserts `value` at a nested key path, creating intermediate tables.
fn insert(dict: &mut Dict, path: &[&str], value: Value) {
    match path {
        [] => {}
        [key] => {
            dict.insert((*key).to_string(), value);
        }
        [key, rest @ ..] => {
            let entry = dict
                .entry((*key).to_string())
                .or_insert_with(|| Value::from(Dict::new()));
            if let Value::Dict(_, inner) = entry {
                insert(inner, rest, value);
            }
        }
    }
}
