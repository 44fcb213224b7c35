use std::{hint::black_box, sync::Arc};

use criterion::{Criterion, criterion_group, criterion_main};

use fareguard::{
    AdmissionController, AdmissionOptions, Identity, ManualClock, Tier, TierPolicy, Timestamp,
};

fn controller() -> AdmissionController {
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(60_000)));
    AdmissionController::new(AdmissionOptions::default(), clock)
}

fn identity(token: &str, limit: u64) -> Identity {
    Identity {
        token: token.to_string(),
        tier: Tier::Pro,
        policy: TierPolicy::new(limit, 1).unwrap(),
    }
}

fn bench_hot_key_admitted(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission/hot_key_admitted");
    group.sample_size(200);

    group.bench_function("admit", |b| {
        let controller = controller();
        let id = identity("k", u64::MAX);
        let now = controller.now();

        b.iter(|| {
            black_box(controller.admit(black_box(&id), black_box(now)));
        });
    });

    group.finish();
}

fn bench_many_keys_admitted(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission/many_keys_admitted");
    group.sample_size(100);

    for key_space in [1_000_usize, 100_000] {
        group.bench_function(format!("admit/keys={key_space}"), |b| {
            let controller = controller();
            let now = controller.now();
            let ids: Vec<Identity> = (0..key_space)
                .map(|i| identity(&format!("user_{i}"), u64::MAX))
                .collect();

            let mut idx = 0_usize;
            b.iter(|| {
                idx = idx.wrapping_add(1);
                let id = &ids[idx % ids.len()];
                black_box(controller.admit(black_box(id), black_box(now)))
            });
        });
    }

    group.finish();
}

fn bench_reject_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission/reject_path");
    group.sample_size(200);

    group.bench_function("admit/rejected", |b| {
        let controller = controller();
        let id = identity("k", 5);
        let now = controller.now();

        // Fill the window so every iteration takes the reject path
        for _ in 0..10 {
            let _ = controller.admit(&id, now);
        }

        b.iter(|| {
            black_box(controller.admit(black_box(&id), black_box(now)));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_hot_key_admitted,
    bench_many_keys_admitted,
    bench_reject_path
);
criterion_main!(benches);
