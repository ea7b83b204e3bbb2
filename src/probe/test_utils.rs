use crate::{
    core::{DomainRecord, Prober},
    probe::{ProbeError, ResolverTarget},
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Key = (String, DomainRecord);

/// Scripted prober for tests.
///
/// Responses are queued per (resolver host, record). The front of the queue
/// is the next response; the last queued response repeats once the others
/// are used up. A record with nothing queued fails with `NoData`.
#[derive(Clone, Default)]
pub struct FakeProber {
    responses: Arc<Mutex<HashMap<Key, VecDeque<Result<String, ProbeError>>>>>,
    call_count: Arc<Mutex<HashMap<Key, u32>>>,
    delay: Option<Duration>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every probe, to exercise concurrency and timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues an answer block for `record` on `host`.
    pub fn add_answer(&self, host: &str, record: &DomainRecord, answer: &str) {
        self.push(host, record, Ok(answer.to_string()));
    }

    /// Queues a failure for `record` on `host`.
    pub fn add_error(&self, host: &str, record: &DomainRecord, error: ProbeError) {
        self.push(host, record, Err(error));
    }

    /// Number of probes issued for `record` against `host`.
    pub fn call_count(&self, host: &str, record: &DomainRecord) -> u32 {
        let call_count = self.call_count.lock().unwrap();
        call_count
            .get(&(host.to_string(), record.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of probes issued against `host`, across all records.
    pub fn total_calls(&self, host: &str) -> u32 {
        let call_count = self.call_count.lock().unwrap();
        call_count
            .iter()
            .filter(|((h, _), _)| h == host)
            .map(|(_, count)| *count)
            .sum()
    }

    fn push(&self, host: &str, record: &DomainRecord, response: Result<String, ProbeError>) {
        let mut responses = self.responses.lock().unwrap();
        responses
            .entry((host.to_string(), record.clone()))
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(
        &self,
        target: &ResolverTarget,
        record: &DomainRecord,
    ) -> Result<String, ProbeError> {
        let key = (target.host.clone(), record.clone());
        {
            let mut call_count = self.call_count.lock().unwrap();
            *call_count.entry(key.clone()).or_insert(0) += 1;
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Err(ProbeError::NoData)),
            Some(queue) => queue.front().cloned().unwrap_or(Err(ProbeError::NoData)),
            None => Err(ProbeError::NoData),
        }
    }
}
