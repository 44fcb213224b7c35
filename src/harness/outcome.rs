use std::{
    collections::HashMap,
    fmt,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use hdrhistogram::Histogram;

use crate::{ApiResponse, FareguardError, TransportError};

/// Classification of one harness call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
    /// `200`.
    Success,
    /// `429`.
    RateLimited,
    /// `401`.
    AuthFailed,
    /// Any other status.
    ServerError(u16),
    /// Timeout or transport failure.
    ConnectionError,
}

impl RequestOutcome {
    /// Maps a call result onto an outcome.
    pub fn classify(result: &Result<ApiResponse, TransportError>) -> Self {
        match result {
            Ok(response) => match response.status {
                200 => RequestOutcome::Success,
                429 => RequestOutcome::RateLimited,
                401 => RequestOutcome::AuthFailed,
                status => RequestOutcome::ServerError(status),
            },
            Err(_) => RequestOutcome::ConnectionError,
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOutcome::Success => f.write_str("SUCCESS"),
            RequestOutcome::RateLimited => f.write_str("RATE_LIMITED"),
            RequestOutcome::AuthFailed => f.write_str("AUTH_FAILED"),
            RequestOutcome::ServerError(status) => write!(f, "ERROR_{status}"),
            RequestOutcome::ConnectionError => f.write_str("CONNECTION_ERROR"),
        }
    }
}

/// Latency percentiles in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    /// Median.
    pub p50_us: u64,
    /// 95th percentile.
    pub p95_us: u64,
    /// 99th percentile.
    pub p99_us: u64,
    /// Slowest call.
    pub max_us: u64,
}

/// Aggregate totals for a run.
///
/// `failed` counts auth failures, server errors and connection errors;
/// `blocked` counts rate-limited calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Every classified call.
    pub total: u64,
    /// Successful calls.
    pub success: u64,
    /// Calls that failed for a reason other than rate limiting.
    pub failed: u64,
    /// Rate-limited calls.
    pub blocked: u64,
    /// Of `failed`: unknown tokens.
    pub auth_failed: u64,
    /// Of `failed`: unexpected statuses.
    pub server_errors: u64,
    /// Of `failed`: timeouts and transport failures.
    pub connection_errors: u64,
    /// `success / total` in percent.
    pub success_rate: f64,
    /// `blocked / total` in percent.
    pub block_rate: f64,
    /// Latency percentiles, if any call completed.
    pub latency: Option<LatencySummary>,
    /// Wall time covered by the run.
    pub elapsed: Duration,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "simulation report")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "elapsed_s={:.1}", self.elapsed.as_secs_f64())?;
        writeln!(f, "total={}", self.total)?;
        writeln!(f, "success={}", self.success)?;
        writeln!(
            f,
            "failed={} (auth={} server={} connection={})",
            self.failed, self.auth_failed, self.server_errors, self.connection_errors
        )?;
        writeln!(f, "blocked={}", self.blocked)?;
        if self.total > 0 {
            writeln!(f, "success_rate={:.1}%", self.success_rate)?;
            writeln!(f, "block_rate={:.1}%", self.block_rate)?;
        }
        if let Some(latency) = self.latency {
            writeln!(
                f,
                "lat_us p50={} p95={} p99={} max={}",
                latency.p50_us, latency.p95_us, latency.p99_us, latency.max_us
            )?;
        }
        write!(f, "{rule}")
    }
}

/// Running totals shared by all harness workers.
pub struct StatsCollector {
    total: AtomicU64,
    success: AtomicU64,
    blocked: AtomicU64,
    auth_failed: AtomicU64,
    server_errors: AtomicU64,
    connection_errors: AtomicU64,
    admitted: DashMap<String, u64>,
    latency: Mutex<Histogram<u64>>,
}

impl StatsCollector {
    /// Empty collector.
    pub fn new() -> Result<Self, FareguardError> {
        Ok(Self {
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            auth_failed: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            admitted: DashMap::new(),
            latency: Mutex::new(Histogram::<u64>::new_with_bounds(1, 60_000_000, 3)?),
        })
    }

    /// Folds one call into the totals.
    pub fn record(&self, token: &str, outcome: RequestOutcome, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);

        let counter = match outcome {
            RequestOutcome::Success => {
                *self.admitted.entry(token.to_string()).or_insert(0) += 1;
                &self.success
            }
            RequestOutcome::RateLimited => &self.blocked,
            RequestOutcome::AuthFailed => &self.auth_failed,
            RequestOutcome::ServerError(_) => &self.server_errors,
            RequestOutcome::ConnectionError => &self.connection_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if outcome != RequestOutcome::ConnectionError {
            let us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
            let _ = self
                .latency
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(us.clamp(1, 60_000_000));
        }
    } // end method record

    /// Successful calls per token.
    pub fn admitted_by_identity(&self) -> HashMap<String, u64> {
        self.admitted
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Totals so far.
    pub fn snapshot(&self, elapsed: Duration) -> Statistics {
        let total = self.total.load(Ordering::Relaxed);
        let success = self.success.load(Ordering::Relaxed);
        let blocked = self.blocked.load(Ordering::Relaxed);
        let auth_failed = self.auth_failed.load(Ordering::Relaxed);
        let server_errors = self.server_errors.load(Ordering::Relaxed);
        let connection_errors = self.connection_errors.load(Ordering::Relaxed);

        let percent = |part: u64| {
            if total == 0 {
                0.0
            } else {
                part as f64 / total as f64 * 100.0
            }
        };

        let latency = {
            let hist = self.latency.lock().unwrap_or_else(PoisonError::into_inner);
            (!hist.is_empty()).then(|| LatencySummary {
                p50_us: hist.value_at_quantile(0.50),
                p95_us: hist.value_at_quantile(0.95),
                p99_us: hist.value_at_quantile(0.99),
                max_us: hist.max(),
            })
        };

        Statistics {
            total,
            success,
            failed: auth_failed + server_errors + connection_errors,
            blocked,
            auth_failed,
            server_errors,
            connection_errors,
            success_rate: percent(success),
            block_rate: percent(blocked),
            latency,
            elapsed,
        }
    } // end method snapshot
}
