use std::{sync::Arc, time::Duration};

use fareguard::{
    Harness, HarnessOptions, LocalClient, ManualClock, MemoryTierResolver, MixedPlan,
    RequestRate, RunLog, Scenario, ServiceOptions, Tier, Timestamp,
};

fn free_pool(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("free-user-{i:04}")).collect()
}

fn client_for(pool: &[String], clock: Arc<ManualClock>) -> LocalClient {
    let options = ServiceOptions {
        seed: Some(11),
        ..ServiceOptions::default()
    };
    let resolver = pool.iter().fold(
        MemoryTierResolver::new(options.tiers),
        |resolver, token| resolver.with_identity(token.clone(), Tier::Free),
    );
    let dispatcher = options
        .build_dispatcher(Arc::new(resolver), clock)
        .unwrap();
    LocalClient::new(Arc::new(dispatcher))
}

fn frozen_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Timestamp::from_secs(60_000)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distributed_identities_are_limited_independently() {
    let pool = free_pool(5);
    let harness = Harness::new(
        client_for(&pool, frozen_clock()),
        pool.clone(),
        HarnessOptions {
            seed: Some(1),
            ..HarnessOptions::default()
        },
        RunLog::in_memory(),
    )
    .unwrap();

    let scenario = Scenario::Distributed {
        duration: Duration::from_millis(400),
        total_rate: RequestRate::try_from(250.0).unwrap(),
    };
    let stats = harness.run(&scenario).await;

    // 50 per second per worker for 400 ms: ~20 calls each, 5 admitted each
    assert!(stats.total >= 50, "total {}", stats.total);
    assert_eq!(stats.success, 25);
    assert_eq!(stats.failed, 0);

    let admitted = harness.stats().admitted_by_identity();
    assert_eq!(admitted.len(), 5);
    for token in &pool {
        assert_eq!(admitted.get(token), Some(&5), "{token}");
    }
}

#[tokio::test]
async fn distributed_uses_at_most_five_workers() {
    let pool = free_pool(8);
    let harness = Harness::new(
        client_for(&pool, frozen_clock()),
        pool.clone(),
        HarnessOptions {
            seed: Some(2),
            ..HarnessOptions::default()
        },
        RunLog::in_memory(),
    )
    .unwrap();

    let scenario = Scenario::Distributed {
        duration: Duration::from_millis(300),
        total_rate: RequestRate::try_from(200.0).unwrap(),
    };
    harness.run(&scenario).await;

    let admitted = harness.stats().admitted_by_identity();
    assert_eq!(admitted.len(), 5);
    assert!(pool[..5].iter().all(|token| admitted.contains_key(token)));
    assert!(pool[5..].iter().all(|token| !admitted.contains_key(token)));
}

#[tokio::test]
async fn mixed_runs_both_phases_on_one_budget() {
    let pool = free_pool(3);
    let harness = Harness::new(
        client_for(&pool, frozen_clock()),
        pool.clone(),
        HarnessOptions {
            seed: Some(3),
            max_requests: Some(30),
            ..HarnessOptions::default()
        },
        RunLog::in_memory(),
    )
    .unwrap();

    let plan = MixedPlan {
        sustained_duration: Duration::from_millis(100),
        sustained_rate: RequestRate::try_from(100.0).unwrap(),
        pause: Duration::from_millis(20),
        burst_duration: Duration::from_secs(10),
        burst_rate: RequestRate::try_from(500.0).unwrap(),
    };
    let stats = harness.run(&Scenario::Mixed(plan)).await;

    assert_eq!(stats.total, 30);
    // three free identities can never exceed 15 admissions in one window
    assert!(stats.success <= 15);
    assert_eq!(stats.success + stats.blocked, 30);
}

#[tokio::test]
async fn seeded_runs_pick_the_same_burst_identity() {
    let pool = free_pool(5);

    let mut picked = Vec::new();
    for _ in 0..2 {
        let harness = Harness::new(
            client_for(&pool, frozen_clock()),
            pool.clone(),
            HarnessOptions {
                seed: Some(99),
                max_requests: Some(3),
                ..HarnessOptions::default()
            },
            RunLog::in_memory(),
        )
        .unwrap();

        let scenario = Scenario::Burst {
            duration: Duration::from_secs(5),
            rate: RequestRate::try_from(1_000.0).unwrap(),
        };
        harness.run(&scenario).await;

        let admitted = harness.stats().admitted_by_identity();
        assert_eq!(admitted.len(), 1);
        picked.push(admitted.into_keys().next().unwrap());
    }

    assert_eq!(picked[0], picked[1]);
}
