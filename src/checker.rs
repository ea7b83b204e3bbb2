//! The consistency checker.
//!
//! Each (name, record type) pair present on both platforms goes through a
//! small state machine: Source A is probed once, Source B is probed and
//! re-probed until its answers match or the retry budget runs out. Pairs are
//! spread over a bounded pool of workers.

use crate::{
    answer::{normalize, AnswerSet, TtlPolicy},
    config::{Mode, PerformanceConfig},
    core::{AuditEntry, ComparisonResult, DomainRecord, Prober, RecordType, Verdict},
    probe::{ProbeError, ResolverTarget},
    task_manager::TaskManager,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, trace, warn};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CheckConfig {
    /// Record types enumerated from Source A.
    pub record_types: Vec<RecordType>,
    /// Extra Source B probes allowed after the first mismatch.
    pub retry_budget: u32,
    /// Pause before each Source B retry in milliseconds.
    pub retry_backoff_ms: u64,
    pub ttl_policy: TtlPolicy,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            record_types: RecordType::ALL.to_vec(),
            retry_budget: 5,
            retry_backoff_ms: 0,
            ttl_policy: TtlPolicy::Compare,
        }
    }
}

/// Where a pair stands in reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Pending,
    /// Waiting on a Source B probe; `remaining` retries are left after it.
    Probing { remaining: u32 },
    /// The last Source B answer differed and a retry is still allowed.
    Retrying { remaining: u32 },
    Consistent,
    Divergent,
}

impl PairState {
    /// Advances the state after one Source B observation.
    pub fn after_probe(self, a: &Observation, b: &Observation) -> PairState {
        let PairState::Probing { remaining } = self else {
            return self;
        };
        if a.matches(b) {
            PairState::Consistent
        } else if a.is_failed() || remaining == 0 {
            // A is never re-probed, so a failed A cannot be matched later.
            PairState::Divergent
        } else {
            PairState::Retrying { remaining }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PairState::Consistent | PairState::Divergent)
    }
}

/// One probe, normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Answered(AnswerSet),
    Failed(ProbeError),
}

impl Observation {
    /// Two observations match only when both answered with equal sets.
    pub fn matches(&self, other: &Observation) -> bool {
        match (self, other) {
            (Observation::Answered(a), Observation::Answered(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Observation::Failed(_))
    }

    /// The answers, or the empty set for a failed probe.
    pub fn answers(&self) -> AnswerSet {
        match self {
            Observation::Answered(set) => set.clone(),
            Observation::Failed(_) => AnswerSet::default(),
        }
    }

    pub fn error(&self) -> Option<String> {
        match self {
            Observation::Answered(_) => None,
            Observation::Failed(e) => Some(e.to_string()),
        }
    }
}

/// What a worker produced for one pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Checked(ComparisonResult),
    Audited(AuditEntry),
}

impl PairOutcome {
    pub fn domain(&self) -> &DomainRecord {
        match self {
            PairOutcome::Checked(result) => &result.domain,
            PairOutcome::Audited(entry) => &entry.domain,
        }
    }
}

/// Counts logged at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pairs: usize,
    pub consistent: usize,
    pub divergent: usize,
    /// Pairs with at least one failed probe.
    pub probe_failures: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[PairOutcome]) -> Self {
        let mut summary = RunSummary {
            pairs: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            let failed = match outcome {
                PairOutcome::Checked(result) => {
                    match result.verdict {
                        Verdict::Consistent => summary.consistent += 1,
                        Verdict::Divergent => summary.divergent += 1,
                        Verdict::MissingFromA => {}
                    }
                    result.error_a.is_some() || result.b_failures > 0
                }
                PairOutcome::Audited(entry) => entry.error_a.is_some() || entry.error_b.is_some(),
            };
            if failed {
                summary.probe_failures += 1;
            }
        }
        summary
    }
}

/// Probes pairs against both platforms' resolvers and classifies them.
pub struct ConsistencyChecker {
    prober: Arc<dyn Prober>,
    source_a: ResolverTarget,
    source_b: ResolverTarget,
    config: CheckConfig,
    probe_timeout: Duration,
}

impl ConsistencyChecker {
    pub fn new(
        prober: Arc<dyn Prober>,
        source_a: ResolverTarget,
        source_b: ResolverTarget,
        config: CheckConfig,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            prober,
            source_a,
            source_b,
            config,
            probe_timeout,
        }
    }

    /// Runs one probe under the per-probe timeout and normalizes its answer.
    ///
    /// Timeouts, failures, unparseable text and empty answers all become
    /// [`Observation::Failed`].
    async fn observe(&self, target: &ResolverTarget, record: &DomainRecord) -> Observation {
        let raw = timeout(self.probe_timeout, self.prober.probe(target, record))
            .await
            .unwrap_or(Err(ProbeError::Timeout(self.probe_timeout)));

        let answers = raw.and_then(|text| {
            let set = normalize(&text, self.config.ttl_policy)?;
            if set.is_empty() {
                return Err(ProbeError::NoData);
            }
            Ok(set)
        });

        match answers {
            Ok(set) => {
                trace!(resolver = %target, answers = %set, "Probe answered");
                Observation::Answered(set)
            }
            Err(e) => {
                debug!(resolver = %target, record = %record, error = %e, "Probe failed");
                Observation::Failed(e)
            }
        }
    }

    /// Reconciles one pair, retrying Source B within the budget.
    #[instrument(skip_all, fields(record = %record))]
    pub async fn check_pair(&self, record: &DomainRecord) -> ComparisonResult {
        let mut state = PairState::Pending;
        trace!(?state);

        let a = self.observe(&self.source_a, record).await;
        state = PairState::Probing {
            remaining: self.config.retry_budget,
        };

        let mut attempts_used = 0;
        let mut b_failures = 0;
        let b = loop {
            let b = self.observe(&self.source_b, record).await;
            attempts_used += 1;
            if b.is_failed() {
                b_failures += 1;
            }
            state = state.after_probe(&a, &b);
            trace!(?state, attempts_used);

            match state {
                PairState::Retrying { remaining } => {
                    debug!(attempts_used, remaining, "Answers differ, probing Source B again");
                    if self.config.retry_backoff_ms > 0 {
                        sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                    }
                    state = PairState::Probing {
                        remaining: remaining - 1,
                    };
                }
                _ => break b,
            }
        };

        let verdict = if state == PairState::Consistent {
            Verdict::Consistent
        } else {
            Verdict::Divergent
        };
        debug!(%verdict, attempts_used, "Pair classified");

        ComparisonResult {
            domain: record.clone(),
            verdict,
            attempts_used,
            last_a: a.answers(),
            last_b: b.answers(),
            error_a: a.error(),
            error_b: b.error(),
            b_failures,
        }
    }

    /// Probes each platform once and returns both answers without a verdict.
    #[instrument(skip_all, fields(record = %record))]
    pub async fn audit_pair(&self, record: &DomainRecord) -> AuditEntry {
        let a = self.observe(&self.source_a, record).await;
        let b = self.observe(&self.source_b, record).await;
        AuditEntry {
            domain: record.clone(),
            answer_a: a.answers(),
            answer_b: b.answers(),
            error_a: a.error(),
            error_b: b.error(),
        }
    }

    /// Processes every pair on a bounded worker pool and returns the
    /// outcomes sorted by (type, name).
    ///
    /// Workers stop early when the task manager's shutdown signal fires; the
    /// pairs they had not finished are absent from the result.
    pub async fn run_all(
        self: &Arc<Self>,
        records: Vec<DomainRecord>,
        mode: Mode,
        performance: &PerformanceConfig,
        task_manager: &TaskManager,
    ) -> Vec<PairOutcome> {
        let total = records.len();
        let (work_tx, work_rx) =
            async_channel::bounded::<DomainRecord>(performance.queue_capacity.max(1));
        let (result_tx, result_rx) = async_channel::bounded::<PairOutcome>(total.max(1));

        let workers = performance.worker_concurrency.max(1).min(total.max(1));
        info!(pairs = total, workers, ?mode, "Starting probe workers");

        for i in 0..workers {
            let checker = self.clone();
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let mut shutdown_rx = task_manager.get_shutdown_rx();

            task_manager.spawn("ProbeWorker", async move {
                debug!("Probe worker {} started.", i);
                loop {
                    let record = tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => {
                            debug!("Probe worker {} received shutdown signal.", i);
                            break;
                        }
                        Ok(record) = work_rx.recv() => record,
                        else => break,
                    };

                    let process = async {
                        match mode {
                            Mode::Check => PairOutcome::Checked(checker.check_pair(&record).await),
                            Mode::Normal => PairOutcome::Audited(checker.audit_pair(&record).await),
                        }
                    };
                    let outcome = tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => {
                            debug!("Probe worker {} aborted {} on shutdown.", i, record);
                            break;
                        }
                        outcome = process => outcome,
                    };

                    if result_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
                debug!("Probe worker {} finished.", i);
            });
        }
        drop(work_rx);
        drop(result_tx);

        for record in records {
            if work_tx.send(record).await.is_err() {
                warn!("All probe workers stopped before the queue was drained");
                break;
            }
        }
        drop(work_tx);

        let mut outcomes = Vec::with_capacity(total);
        while let Ok(outcome) = result_rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes.sort_by(|a, b| {
            let (a, b) = (a.domain(), b.domain());
            (a.record_type(), a.name()).cmp(&(b.record_type(), b.name()))
        });
        outcomes
    }
}
