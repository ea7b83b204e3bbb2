//! Retry-budget behaviour of the consistency checker.

use dnsreconcile::{
    checker::{CheckConfig, ConsistencyChecker, PairOutcome},
    config::{Mode, PerformanceConfig},
    core::{DomainRecord, RecordType, Verdict},
    probe::{test_utils::FakeProber, ResolverTarget},
    task_manager::TaskManager,
};
use std::{sync::Arc, time::Duration};

const A_HOST: &str = "192.0.2.1";
const B_HOST: &str = "192.0.2.2";

fn checker(prober: &FakeProber, retry_budget: u32) -> ConsistencyChecker {
    ConsistencyChecker::new(
        Arc::new(prober.clone()),
        ResolverTarget::new(A_HOST, 53),
        ResolverTarget::new(B_HOST, 53),
        CheckConfig {
            retry_budget,
            ..Default::default()
        },
        Duration::from_secs(1),
    )
}

/// Source B answers wrong for the first `k` probes, then right.
fn flapping(record: &DomainRecord, k: u32) -> FakeProber {
    let prober = FakeProber::new();
    let good = format!("{} 60 IN A 198.51.100.1", record.name());
    let bad = format!("{} 60 IN A 198.51.100.2", record.name());
    prober.add_answer(A_HOST, record, &good);
    for _ in 0..k {
        prober.add_answer(B_HOST, record, &bad);
    }
    prober.add_answer(B_HOST, record, &good);
    prober
}

#[tokio::test]
async fn test_retry_bound_for_every_mismatch_count() {
    let record = DomainRecord::new("pool.example.com.", RecordType::A);
    for budget in 0..=3u32 {
        for k in 0..=budget + 2 {
            let prober = flapping(&record, k);
            let result = checker(&prober, budget).check_pair(&record).await;

            if k <= budget {
                assert_eq!(result.verdict, Verdict::Consistent, "budget={budget} k={k}");
                assert_eq!(result.attempts_used, k + 1, "budget={budget} k={k}");
            } else {
                assert_eq!(result.verdict, Verdict::Divergent, "budget={budget} k={k}");
                assert_eq!(result.attempts_used, budget + 1, "budget={budget} k={k}");
            }
            assert_eq!(prober.call_count(A_HOST, &record), 1);
            assert_eq!(prober.call_count(B_HOST, &record), result.attempts_used);
        }
    }
}

#[tokio::test]
async fn test_total_probes_stay_within_bound() {
    let budget = 2;
    let records: Vec<DomainRecord> = (0..10)
        .map(|i| DomainRecord::new(&format!("host{i}.example.com"), RecordType::A))
        .collect();

    // Every pair diverges, so every pair spends its whole budget.
    let prober = FakeProber::new();
    for record in &records {
        prober.add_answer(A_HOST, record, &format!("{} 60 IN A 198.51.100.1", record.name()));
        prober.add_answer(B_HOST, record, &format!("{} 60 IN A 198.51.100.9", record.name()));
    }

    let checker = Arc::new(checker(&prober, budget));
    let task_manager = TaskManager::new();
    let performance = PerformanceConfig {
        worker_concurrency: 3,
        queue_capacity: 2,
        run_timeout_seconds: 0,
    };
    let outcomes = checker
        .run_all(records.clone(), Mode::Check, &performance, &task_manager)
        .await;
    task_manager.shutdown().await;

    assert_eq!(outcomes.len(), records.len());
    for outcome in &outcomes {
        let PairOutcome::Checked(result) = outcome else {
            panic!("check mode produced {:?}", outcome);
        };
        assert_eq!(result.verdict, Verdict::Divergent);
        assert_eq!(result.attempts_used, budget + 1);
    }
    let total = prober.total_calls(A_HOST) + prober.total_calls(B_HOST);
    assert_eq!(total, records.len() as u32 * (1 + budget + 1));
}

#[tokio::test]
async fn test_audit_mode_probes_each_side_once() {
    let records: Vec<DomainRecord> = ["a.example.", "b.example."]
        .iter()
        .map(|name| DomainRecord::new(name, RecordType::A))
        .collect();
    let prober = FakeProber::new();
    for record in &records {
        prober.add_answer(B_HOST, record, &format!("{} 60 IN A 198.51.100.9", record.name()));
    }

    let checker = Arc::new(checker(&prober, 5));
    let task_manager = TaskManager::new();
    let outcomes = checker
        .run_all(
            records,
            Mode::Normal,
            &PerformanceConfig {
                worker_concurrency: 2,
                queue_capacity: 4,
                run_timeout_seconds: 0,
            },
            &task_manager,
        )
        .await;
    task_manager.shutdown().await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|outcome| matches!(outcome, PairOutcome::Audited(entry) if entry.error_a.is_some())));
    assert_eq!(prober.total_calls(A_HOST), 2);
    assert_eq!(prober.total_calls(B_HOST), 2);
}
