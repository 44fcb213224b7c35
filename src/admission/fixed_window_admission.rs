use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use dashmap::DashMap;

use crate::{
    AdmissionDecision, AdmissionOptions, Clock, Identity, Timestamp, WindowKey,
    WindowSizeSeconds, mask_token,
};

struct CleanupLoop {
    stop: Arc<AtomicBool>,
}

/// Fixed-window, per-identity admission counter.
///
/// Every identity gets one counter per aligned window
/// (`window_index = floor(now / window_size)`). A request is admitted while
/// the counter is below the identity's `limit_per_window`.
///
/// # Algorithm
///
/// 1. **Key:** `(token, floor(now / window_size))`
/// 2. **Check:** reject if `count >= limit`
/// 3. **Increment:** otherwise add one and admit
///
/// Steps 2 and 3 are a single compare-and-swap on the key's counter, so for
/// any interleaving of `C` concurrent calls on one key the admitted count is
/// exactly `min(C, limit)`.
///
/// # Thread Safety
///
/// - Uses [`DashMap`](dashmap::DashMap) for sharded key access; identities in
///   different shards never contend
/// - Uses one [`AtomicU64`] per key for the check-and-increment
/// - Safe for multi-threaded use without external synchronization
///
/// # Memory
///
/// A new key is created for every identity in every window it is active.
/// Windows older than the previous one are dropped by
/// [`evict_stale_windows`](Self::evict_stale_windows), which
/// [`run_cleanup_loop`](Self::run_cleanup_loop) calls periodically.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fareguard::{
///     AdmissionController, AdmissionOptions, ManualClock, MemoryTierResolver, Tier,
///     TierResolver, TierTable, Timestamp,
/// };
///
/// let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_000)));
/// let controller = AdmissionController::new(AdmissionOptions::default(), clock);
/// let resolver = MemoryTierResolver::new(TierTable::default()).with_identity("tok", Tier::Free);
/// let identity = resolver.lookup("tok").unwrap();
///
/// let now = controller.now();
/// for _ in 0..5 {
///     assert!(controller.admit(&identity, now).is_admitted());
/// }
/// assert!(!controller.admit(&identity, now).is_admitted());
/// ```
pub struct AdmissionController {
    window_size_seconds: WindowSizeSeconds,
    clock: Arc<dyn Clock>,
    counters: DashMap<WindowKey, AtomicU64>,
    cleanup_loop: Mutex<Option<CleanupLoop>>,
}

impl AdmissionController {
    /// Creates a controller with an empty counter store.
    pub fn new(options: AdmissionOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            window_size_seconds: options.window_size_seconds,
            clock,
            counters: DashMap::new(),
            cleanup_loop: Mutex::new(None),
        }
    } // end constructor

    /// Fixed window length.
    pub fn window_size_seconds(&self) -> WindowSizeSeconds {
        self.window_size_seconds
    }

    /// Current time according to the controller's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Check the quota for `identity` and, if there is room, count one admission.
    ///
    /// # Returns
    ///
    /// - [`AdmissionDecision::Admitted`]: counted, `used` includes this request
    /// - [`AdmissionDecision::Rejected`]: quota exhausted, nothing counted
    ///
    /// Never retries and never blocks on I/O.
    pub fn admit(&self, identity: &Identity, now: Timestamp) -> AdmissionDecision {
        let key = WindowKey::new(&identity.token, now, self.window_size_seconds);
        let limit = identity.limit_per_window();

        let acquired = match self.counters.get(&key) {
            Some(counter) => try_acquire(&counter, limit),
            None => {
                let counter = self.counters.entry(key).or_insert_with(|| AtomicU64::new(0));
                try_acquire(&counter, limit)
            }
        };

        match acquired {
            Some(used) => AdmissionDecision::Admitted { used, limit },
            None => {
                tracing::debug!(
                    token = %mask_token(&identity.token),
                    limit,
                    "admission rejected, window quota exhausted"
                );

                AdmissionDecision::Rejected {
                    window_size_seconds: *self.window_size_seconds,
                    retry_after_ms: now.until_window_end(self.window_size_seconds),
                    limit,
                }
            }
        }
    } // end method admit

    /// Admissions already counted for `token` in the window containing `now`.
    pub fn used(&self, token: &str, now: Timestamp) -> u64 {
        let key = WindowKey::new(token, now, self.window_size_seconds);
        self.counters
            .get(&key)
            .map(|counter| counter.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Number of `(token, window)` entries currently held.
    pub fn tracked_windows(&self) -> usize {
        self.counters.len()
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> BTreeMap<WindowKey, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Acquire)))
            .collect()
    }

    /// Drop every entry older than the window before the one containing `now`.
    ///
    /// The previous window is kept: a caller that read its timestamp just
    /// before a boundary may still admit into it after the sweep, and a
    /// recreated counter would start again from zero.
    ///
    /// Returns the number of entries removed.
    pub fn evict_stale_windows(&self, now: Timestamp) -> usize {
        let current = now.window_index(self.window_size_seconds);
        let before = self.counters.len();
        self.counters
            .retain(|key, _| key.window_index.saturating_add(1) >= current);
        let removed = before.saturating_sub(self.counters.len());

        if removed > 0 {
            tracing::debug!(removed, window_index = current, "evicted stale admission windows");
        }

        removed
    } // end method evict_stale_windows

    /// Start the background eviction loop, sweeping once per window.
    pub fn run_cleanup_loop(self: &Arc<Self>) {
        self.run_cleanup_loop_with_config(self.window_size_seconds.as_millis());
    }

    /// Start the background eviction loop with a custom sweep interval.
    ///
    /// The loop sweeps immediately, then every `interval_ms`. It holds only a
    /// weak reference and exits once the controller is dropped. Calling this
    /// while a loop is running does nothing.
    pub fn run_cleanup_loop_with_config(self: &Arc<Self>, interval_ms: u64) {
        let mut guard = self
            .cleanup_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if guard.is_some() {
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = Duration::from_millis(interval_ms.max(1));
        let thread_stop = Arc::clone(&stop);

        let spawned = thread::Builder::new()
            .name("fareguard-cleanup".to_string())
            .spawn(move || {
                loop {
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }

                    let Some(controller) = weak.upgrade() else {
                        break;
                    };
                    controller.evict_stale_windows(controller.now());
                    drop(controller);

                    thread::sleep(interval);
                }
            });

        match spawned {
            Ok(_) => *guard = Some(CleanupLoop { stop }),
            Err(err) => tracing::error!(error = ?err, "failed to spawn admission cleanup thread"),
        }
    } // end method run_cleanup_loop_with_config

    /// Stop the background eviction loop. Safe to call repeatedly.
    pub fn stop_cleanup_loop(&self) {
        let mut guard = self
            .cleanup_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(cleanup_loop) = guard.take() {
            cleanup_loop.stop.store(true, Ordering::Release);
        }
    }
} // end of impl

fn try_acquire(counter: &AtomicU64, limit: u64) -> Option<u64> {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
            (used < limit).then_some(used + 1)
        })
        .ok()
        .map(|previous| previous + 1)
}
