//! Load simulation harness.
//!
//! Drives a [`FlightApi`] with paced traffic from a pool of bearer tokens and
//! classifies every call. The harness never looks inside the API: it only
//! sees status codes and transport failures.
//!
//! Workers pace themselves against a fixed schedule: a worker at rate `r`
//! issues its `n`-th call no earlier than `n / r` seconds after it started.
//! A slow call delays the next one but does not shift the schedule, so a
//! worker catches up after a stall.
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use fareguard::{
//!     Harness, HarnessOptions, LocalClient, MemoryTierResolver, RunLog, ScenarioKind,
//!     ServiceOptions, SystemClock, Tier,
//! };
//!
//! # async fn run() -> Result<(), fareguard::FareguardError> {
//! let options = ServiceOptions::default();
//! let resolver = MemoryTierResolver::new(options.tiers)
//!     .with_identity("free-token-0001", Tier::Free)
//!     .with_identity("pro-token-0001", Tier::Pro);
//! let pool = resolver.tokens();
//!
//! let dispatcher = options.build_dispatcher(Arc::new(resolver), Arc::new(SystemClock))?;
//! let harness = Harness::new(
//!     LocalClient::new(Arc::new(dispatcher)),
//!     pool,
//!     HarnessOptions::default(),
//!     RunLog::in_memory(),
//! )?;
//!
//! let scenario = ScenarioKind::Distributed.into_scenario(Duration::from_secs(10), 2.0)?;
//! let stats = harness.run(&scenario).await;
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```

mod client;
mod outcome;
mod query_gen;
mod run_log;
mod scenario;

pub use client::*;
pub use outcome::*;
pub use query_gen::*;
pub use run_log::*;
pub use scenario::*;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::Local;
use rand::seq::SliceRandom;
use tokio::{
    sync::watch,
    task::JoinSet,
    time::{Instant, sleep_until, timeout},
};

use crate::{FareguardError, FlightQuery, RequestRate, RngSeeder, mask_token, rng::stream_rng};

const PICK_STREAM: u64 = 1_000;
const DISTRIBUTED_STREAM_BASE: u64 = 100;

/// Knobs for a [`Harness`].
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Per-call timeout. A call that exceeds it counts as a connection error.
    pub timeout: Duration,
    /// Master seed. `None` draws one from OS entropy.
    pub seed: Option<u64>,
    /// Stop issuing calls once this many have been started, across all workers.
    pub max_requests: Option<u64>,
    /// Upper bound on distributed workers.
    pub max_distributed_workers: usize,
    /// Source of query parameters.
    pub generator: QueryGenerator,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            seed: None,
            max_requests: None,
            max_distributed_workers: 5,
            generator: QueryGenerator::default(),
        }
    }
}

/// Stops a running [`Harness`] from another task.
///
/// Workers finish the call in flight and then exit; pacing sleeps are cut short.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Signals every worker to stop. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

#[derive(Clone)]
enum IdentityPick {
    Random,
    Fixed(String),
}

struct Worker {
    identity: IdentityPick,
    rate: RequestRate,
    duration: Duration,
    stream: u64,
    scenario: &'static str,
}

struct HarnessInner<C> {
    client: C,
    pool: Vec<String>,
    options: HarnessOptions,
    master_seed: u64,
    stats: StatsCollector,
    log: RunLog,
    issued: AtomicU64,
    shutdown: ShutdownHandle,
    shutdown_rx: watch::Receiver<bool>,
}

/// Runs [`Scenario`]s against a [`FlightApi`].
///
/// Statistics and the run log accumulate across runs on the same harness.
pub struct Harness<C> {
    inner: Arc<HarnessInner<C>>,
}

impl<C: FlightApi> Harness<C> {
    /// Harness over `client` with `pool` as the identities to send.
    pub fn new(
        client: C,
        pool: Vec<String>,
        options: HarnessOptions,
        log: RunLog,
    ) -> Result<Self, FareguardError> {
        if pool.is_empty() {
            return Err(FareguardError::EmptyIdentityPool);
        }

        let master_seed = options
            .seed
            .map(RngSeeder::seeded)
            .unwrap_or_else(RngSeeder::from_entropy)
            .master_seed();
        let (tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(HarnessInner {
                client,
                pool,
                options,
                master_seed,
                stats: StatsCollector::new()?,
                log,
                issued: AtomicU64::new(0),
                shutdown: ShutdownHandle { tx: Arc::new(tx) },
                shutdown_rx,
            }),
        })
    }

    /// Handle that stops this harness.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.inner.shutdown.clone()
    }

    /// Running totals.
    pub fn stats(&self) -> &StatsCollector {
        &self.inner.stats
    }

    /// Per-call log.
    pub fn run_log(&self) -> &RunLog {
        &self.inner.log
    }

    /// Master seed in use, for reproducing a run.
    pub fn master_seed(&self) -> u64 {
        self.inner.master_seed
    }

    /// Runs `scenario` to completion, shutdown, or the request budget,
    /// whichever comes first, and returns the totals.
    pub async fn run(&self, scenario: &Scenario) -> Statistics {
        let started = std::time::Instant::now();
        tracing::info!(
            scenario = scenario.name(),
            identities = self.inner.pool.len(),
            seed = self.inner.master_seed,
            "starting scenario"
        );

        match *scenario {
            Scenario::Sustained { duration, rate } => {
                self.inner
                    .drive(Worker {
                        identity: IdentityPick::Random,
                        rate,
                        duration,
                        stream: 0,
                        scenario: "sustained",
                    })
                    .await;
            }
            Scenario::Burst { duration, rate } => {
                self.inner.run_burst(duration, rate, "burst").await;
            }
            Scenario::Distributed {
                duration,
                total_rate,
            } => {
                self.run_distributed(duration, total_rate).await;
            }
            Scenario::Mixed(plan) => {
                self.inner
                    .drive(Worker {
                        identity: IdentityPick::Random,
                        rate: plan.sustained_rate,
                        duration: plan.sustained_duration,
                        stream: 0,
                        scenario: "mixed",
                    })
                    .await;
                self.inner.pause(plan.pause).await;
                self.inner
                    .run_burst(plan.burst_duration, plan.burst_rate, "mixed")
                    .await;
            }
        }

        if let Err(err) = self.inner.log.flush() {
            tracing::warn!(error = ?err, "failed to flush run log");
        }

        let stats = self.inner.stats.snapshot(started.elapsed());
        tracing::info!(
            scenario = scenario.name(),
            total = stats.total,
            success = stats.success,
            blocked = stats.blocked,
            failed = stats.failed,
            "scenario finished"
        );
        stats
    } // end method run

    async fn run_distributed(&self, duration: Duration, total_rate: RequestRate) {
        let workers = self
            .inner
            .pool
            .len()
            .min(self.inner.options.max_distributed_workers.max(1));
        let rate = total_rate.split(workers);

        let mut set = JoinSet::new();
        for (idx, token) in self.inner.pool.iter().take(workers).enumerate() {
            let inner = Arc::clone(&self.inner);
            let worker = Worker {
                identity: IdentityPick::Fixed(token.clone()),
                rate,
                duration,
                stream: DISTRIBUTED_STREAM_BASE + idx as u64,
                scenario: "distributed",
            };
            set.spawn(async move { inner.drive(worker).await });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = ?err, "distributed worker failed");
            }
        }
    }
}

impl<C: FlightApi> HarnessInner<C> {
    async fn run_burst(&self, duration: Duration, rate: RequestRate, scenario: &'static str) {
        let mut rng = stream_rng(self.master_seed, PICK_STREAM);
        let token = self.pool.choose(&mut rng).cloned().unwrap_or_default();
        tracing::info!(scenario, token = %mask_token(&token), "burst identity selected");

        self.drive(Worker {
            identity: IdentityPick::Fixed(token),
            rate,
            duration,
            stream: 1,
            scenario,
        })
        .await;
    }

    async fn drive(&self, worker: Worker) {
        let mut rng = stream_rng(self.master_seed, worker.stream);
        let mut shutdown = self.shutdown_rx.clone();
        let per_op = worker.rate.interval();
        let deadline = Instant::now() + worker.duration;
        let mut next_deadline = Instant::now();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if now < next_deadline {
                tokio::select! {
                    _ = sleep_until(next_deadline.min(deadline)) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            }
            next_deadline += per_op;

            if !self.reserve_slot() {
                break;
            }

            let token = match &worker.identity {
                IdentityPick::Fixed(token) => token.clone(),
                IdentityPick::Random => self.pool.choose(&mut rng).cloned().unwrap_or_default(),
            };
            let query = self
                .options
                .generator
                .generate(&mut rng, Local::now().date_naive());

            self.call(&token, &query, worker.scenario).await;
        }
    } // end method drive

    async fn call(&self, token: &str, query: &FlightQuery, scenario: &'static str) -> RequestOutcome {
        let started = Instant::now();
        let result = match timeout(self.options.timeout, self.client.get_flights(token, query)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.options.timeout)),
        };
        let latency = started.elapsed();

        let outcome = RequestOutcome::classify(&result);
        self.stats.record(token, outcome, latency);
        self.log.append(RunLogEntry::new(token, outcome, query, latency));

        tracing::debug!(
            scenario,
            token = %mask_token(token),
            status = %outcome,
            latency_us = latency.as_micros() as u64,
            "api request"
        );
        outcome
    }

    async fn pause(&self, duration: Duration) {
        let mut shutdown = self.shutdown_rx.clone();
        if *shutdown.borrow() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = shutdown.changed() => {}
        }
    }

    fn reserve_slot(&self) -> bool {
        match self.options.max_requests {
            None => true,
            Some(max) => self
                .issued
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |issued| {
                    (issued < max).then_some(issued + 1)
                })
                .is_ok(),
        }
    }
}
