use crate::core::{DomainRecord, Prober, RecordType};
use crate::probe::{ProbeError, ResolverTarget};
use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfig, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::rr::RecordType as WireType,
    proto::xfer::Protocol,
    TokioResolver,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{debug, instrument, trace};

/// DNS prober that queries a resolver in-process with hickory-resolver.
///
/// One resolver is built per target and kept for the run. Caching is
/// disabled so that every retry reaches the target.
pub struct HickoryProber {
    timeout: Duration,
    resolvers: Mutex<HashMap<ResolverTarget, Arc<TokioResolver>>>,
}

impl HickoryProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            resolvers: Mutex::new(HashMap::new()),
        }
    }

    async fn resolver_for(
        &self,
        target: &ResolverTarget,
    ) -> Result<Arc<TokioResolver>, ProbeError> {
        if let Some(resolver) = self.lock_resolvers().get(target) {
            return Ok(resolver.clone());
        }

        let addr = socket_addr(target).await?;
        debug!(resolver = %target, %addr, "Building resolver for target");

        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));
        config.add_name_server(NameServerConfig::new(addr, Protocol::Tcp));

        let mut opts = ResolverOpts::default();
        opts.timeout = self.timeout;
        opts.attempts = 1;
        opts.cache_size = 0;
        // Names are already fully qualified.
        opts.ndots = 0;

        let resolver = Arc::new(
            hickory_resolver::Resolver::builder_with_config(
                config,
                TokioConnectionProvider::default(),
            )
            .with_options(opts)
            .build(),
        );

        Ok(self
            .lock_resolvers()
            .entry(target.clone())
            .or_insert(resolver)
            .clone())
    }

    fn lock_resolvers(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ResolverTarget, Arc<TokioResolver>>> {
        // The map holds no invariants a panicking writer could break.
        self.resolvers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn socket_addr(target: &ResolverTarget) -> Result<SocketAddr, ProbeError> {
    if let Some(ip) = target.ip() {
        return Ok(SocketAddr::new(ip, target.port));
    }
    let unreachable = |reason: String| ProbeError::Unreachable {
        target: target.to_string(),
        reason,
    };
    tokio::net::lookup_host((target.host.as_str(), target.port))
        .await
        .map_err(|e| unreachable(e.to_string()))?
        .next()
        .ok_or_else(|| unreachable("host name has no addresses".to_string()))
}

fn wire_type(record_type: RecordType) -> WireType {
    match record_type {
        RecordType::A => WireType::A,
        RecordType::AAAA => WireType::AAAA,
        RecordType::CNAME => WireType::CNAME,
        RecordType::MX => WireType::MX,
        RecordType::NAPTR => WireType::NAPTR,
        RecordType::SRV => WireType::SRV,
    }
}

/// Classifies a hickory error message.
fn classify_error(err_str: String, timeout: Duration) -> ProbeError {
    let lower = err_str.to_lowercase();
    if lower.contains("no records found") || lower.contains("nxdomain") {
        ProbeError::NoData
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ProbeError::Timeout(timeout)
    } else {
        ProbeError::Resolution(err_str)
    }
}

#[async_trait]
impl Prober for HickoryProber {
    #[instrument(skip_all, fields(resolver = %target, record = %record))]
    async fn probe(
        &self,
        target: &ResolverTarget,
        record: &DomainRecord,
    ) -> Result<String, ProbeError> {
        let resolver = self.resolver_for(target).await?;
        let lookup = resolver
            .lookup(record.name(), wire_type(record.record_type()))
            .await
            .map_err(|e| classify_error(e.to_string(), self.timeout))?;

        // Record's Display is presentation format: "name ttl class type rdata".
        let lines: Vec<String> = lookup.records().iter().map(|r| r.to_string()).collect();
        trace!(answers = lines.len(), "Lookup complete");
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let timeout = Duration::from_secs(2);
        assert_eq!(
            classify_error("no records found for Query { name: foo.com. }".into(), timeout),
            ProbeError::NoData
        );
        assert_eq!(
            classify_error("request timed out".into(), timeout),
            ProbeError::Timeout(timeout)
        );
        assert!(matches!(
            classify_error("io error: connection refused".into(), timeout),
            ProbeError::Resolution(_)
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_target_host() {
        let prober = HickoryProber::new(Duration::from_millis(200));
        let err = prober
            .probe(
                &ResolverTarget::new("resolver.invalid", 53),
                &DomainRecord::new("foo.com.", RecordType::A),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Unreachable { .. }), "unexpected error: {err}");
    }
}
