//! The main application logic, decoupled from the entry point.

use crate::{
    checker::{ConsistencyChecker, PairOutcome, RunSummary},
    config::{Config, ConfigError, Mode},
    core::{DomainRecord, InventorySource, Prober},
    inventory::{
        build_http_client, find_gap, present_in_both, InventoryError, InventoryGap,
        LegacyGtmSource, PagedZoneSource,
    },
    probe::build_prober,
    report::{FileReportSink, ReportSink},
    task_manager::TaskManager,
};
use std::{io, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Failures that end a run without a verdict.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("unknown mode '{0}', expected 'check' or 'normal'")]
    UnknownMode(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("inventory fetch failed: {0}")]
    InventoryFetch(#[from] InventoryError),

    #[error("probe phase did not finish within {0:?}")]
    Timeout(Duration),

    #[error("could not write report log: {0}")]
    Report(#[from] io::Error),
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every probed pair was consistent.
    Passed { summary: RunSummary },
    /// At least one pair stayed divergent after its retries.
    Divergent {
        summary: RunSummary,
        divergent: Vec<DomainRecord>,
    },
    /// Report-only mode finished; findings are in the report log.
    AuditCompleted { summary: RunSummary },
    /// Source A is missing names Source B serves; nothing was probed.
    InventoryGap(InventoryGap),
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Passed { .. } | RunOutcome::AuditCompleted { .. } => 0,
            RunOutcome::Divergent { .. } | RunOutcome::InventoryGap(_) => 1,
        }
    }
}

/// A fully wired run.
pub struct App {
    config: Config,
    mode: Mode,
    source_a: Arc<dyn InventorySource>,
    source_b: Arc<dyn InventorySource>,
    checker: Arc<ConsistencyChecker>,
    report: Arc<dyn ReportSink>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// Fetches both inventories, checks for a gap, then probes every pair
    /// present on both platforms.
    #[instrument(skip_all, fields(mode = ?self.mode))]
    pub async fn run(self) -> Result<RunOutcome, RunError> {
        let (inventory_a, inventory_b) =
            tokio::try_join!(self.source_a.fetch(), self.source_b.fetch())?;
        info!(
            source_a = inventory_a.len(),
            source_b = inventory_b.len(),
            "Inventories fetched"
        );

        if let Some(gap) = find_gap(&inventory_a, &inventory_b) {
            info!(missing = gap.missing.len(), "Source A is missing names Source B serves");
            self.report.gap(&gap)?;
            self.report.flush()?;
            return Ok(RunOutcome::InventoryGap(gap));
        }

        let pairs = present_in_both(&inventory_a, &inventory_b);
        let outcomes = self.probe_all(pairs).await?;

        for outcome in &outcomes {
            match outcome {
                PairOutcome::Checked(result) => self.report.record(result)?,
                PairOutcome::Audited(entry) => self.report.audit(entry)?,
            }
        }
        self.report.flush()?;

        let summary = RunSummary::from_outcomes(&outcomes);
        info!(
            pairs = summary.pairs,
            consistent = summary.consistent,
            divergent = summary.divergent,
            probe_failures = summary.probe_failures,
            "Run finished"
        );

        Ok(match self.mode {
            Mode::Normal => RunOutcome::AuditCompleted { summary },
            Mode::Check if summary.divergent > 0 => RunOutcome::Divergent {
                summary,
                divergent: outcomes
                    .iter()
                    .filter_map(|outcome| match outcome {
                        PairOutcome::Checked(result) if !result.is_consistent() => {
                            Some(result.domain.clone())
                        }
                        _ => None,
                    })
                    .collect(),
            },
            Mode::Check => RunOutcome::Passed { summary },
        })
    }

    /// Runs the worker pool under the optional run timeout.
    async fn probe_all(&self, pairs: Vec<DomainRecord>) -> Result<Vec<PairOutcome>, RunError> {
        let task_manager = TaskManager::new();
        let work = self
            .checker
            .run_all(pairs, self.mode, &self.config.performance, &task_manager);

        let outcomes = match self.config.performance.run_timeout_seconds {
            0 => work.await,
            seconds => {
                let limit = Duration::from_secs(seconds);
                match tokio::time::timeout(limit, work).await {
                    Ok(outcomes) => outcomes,
                    Err(_) => {
                        warn!(?limit, "Run timeout reached, stopping probe workers");
                        task_manager.trigger_shutdown();
                        task_manager.shutdown().await;
                        return Err(RunError::Timeout(limit));
                    }
                }
            }
        };

        task_manager.shutdown().await;
        Ok(outcomes)
    }
}

/// Builder for the main application.
///
/// Every external dependency can be overridden, which is how tests run the
/// whole pipeline without HTTP or DNS traffic.
pub struct AppBuilder {
    config: Config,
    source_a_override: Option<Arc<dyn InventorySource>>,
    source_b_override: Option<Arc<dyn InventorySource>>,
    prober_override: Option<Arc<dyn Prober>>,
    report_sink_override: Option<Arc<dyn ReportSink>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            source_a_override: None,
            source_b_override: None,
            prober_override: None,
            report_sink_override: None,
        }
    }

    /// Overrides the Source A inventory for testing.
    pub fn source_a_override(mut self, source: Arc<dyn InventorySource>) -> Self {
        self.source_a_override = Some(source);
        self
    }

    /// Overrides the Source B inventory for testing.
    pub fn source_b_override(mut self, source: Arc<dyn InventorySource>) -> Self {
        self.source_b_override = Some(source);
        self
    }

    /// Overrides the prober for testing.
    pub fn prober_override(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober_override = Some(prober);
        self
    }

    /// Overrides the report log for testing.
    pub fn report_sink_override(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.report_sink_override = Some(sink);
        self
    }

    /// Wires the run. The mode is checked first, so an unknown mode fails
    /// before the report log is touched or any request is made.
    pub fn build(self) -> Result<App, RunError> {
        let config = self.config;
        let mode: Mode = config.mode.parse().map_err(RunError::UnknownMode)?;
        config.validate()?;
        let (endpoint_a, endpoint_b) = config.endpoints()?;

        let client = build_http_client(&config.inventory)?;
        let inventory = &config.inventory;
        let source_a = self.source_a_override.unwrap_or_else(|| {
            Arc::new(LegacyGtmSource::new(
                client.clone(),
                format!(
                    "{}://{}{}",
                    inventory.scheme, endpoint_a.data_host, inventory.legacy_path
                ),
                endpoint_a.credentials(),
                config.check.record_types.clone(),
            ))
        });
        let source_b = self.source_b_override.unwrap_or_else(|| {
            Arc::new(PagedZoneSource::new(
                client,
                format!(
                    "{}://{}:{}/views/{}/dzone",
                    inventory.scheme,
                    endpoint_b.data_host,
                    inventory.platform_port,
                    inventory.platform_view
                ),
                endpoint_b.credentials(),
                inventory.page_size,
                inventory.platform_record_type,
            ))
        });

        let prober = self
            .prober_override
            .unwrap_or_else(|| build_prober(&config.probe));
        let checker = Arc::new(ConsistencyChecker::new(
            prober,
            endpoint_a.resolve_host.clone(),
            endpoint_b.resolve_host.clone(),
            config.check.clone(),
            Duration::from_millis(config.probe.timeout_ms),
        ));

        let report = match self.report_sink_override {
            Some(sink) => sink,
            None => Arc::new(FileReportSink::open(
                &config.report.path,
                config.report.truncate,
            )?) as Arc<dyn ReportSink>,
        };

        info!(
            source_a = %endpoint_a.data_host,
            source_b = %endpoint_b.data_host,
            backend = config.probe.backend.as_str(),
            retry_budget = config.check.retry_budget,
            "Run configured"
        );

        Ok(App {
            config,
            mode,
            source_a,
            source_b,
            checker,
            report,
        })
    }
}
