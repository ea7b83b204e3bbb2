use crate::core::{DomainRecord, Prober};
use crate::probe::{ProbeError, ResolverTarget, DEFAULT_DNS_PORT};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{instrument, trace};

/// Probes a resolver by running `dig @host name TYPE +noall +answer`.
pub struct DigProber {
    program: String,
    timeout: Duration,
}

impl DigProber {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// The argument list for one query.
    pub fn args(&self, target: &ResolverTarget, record: &DomainRecord) -> Vec<String> {
        let mut args = vec![format!("@{}", target.host)];
        if target.port != DEFAULT_DNS_PORT {
            args.push("-p".to_string());
            args.push(target.port.to_string());
        }
        // dig's own timer is whole seconds and at least one.
        let seconds = self.timeout.as_secs().max(1);
        args.extend([
            record.name().to_string(),
            record.record_type().to_string(),
            "+noall".to_string(),
            "+answer".to_string(),
            format!("+time={}", seconds),
            "+tries=1".to_string(),
        ]);
        args
    }
}

#[async_trait]
impl Prober for DigProber {
    #[instrument(skip_all, fields(resolver = %target, record = %record))]
    async fn probe(
        &self,
        target: &ResolverTarget,
        record: &DomainRecord,
    ) -> Result<String, ProbeError> {
        let args = self.args(target, record);
        trace!(program = %self.program, ?args, "Running dig");

        let run = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(|e| ProbeError::Spawn {
                command: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
