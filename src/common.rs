use std::{
    ops::Deref,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::FareguardError;

/// Length of one fixed admission window, in seconds.
///
/// Must be at least 1. Defaults to 60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct WindowSizeSeconds(u64);

impl WindowSizeSeconds {
    /// Window length in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0.saturating_mul(1000)
    }
}

impl Default for WindowSizeSeconds {
    fn default() -> Self {
        Self(60)
    }
}

impl Deref for WindowSizeSeconds {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for WindowSizeSeconds {
    type Error = FareguardError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(FareguardError::InvalidWindowSize(
                "Window size must be at least 1".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

impl From<WindowSizeSeconds> for u64 {
    fn from(value: WindowSizeSeconds) -> Self {
        value.0
    }
}

/// Interval between background sweeps of stale admission windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct CleanupIntervalMs(u64);

impl Default for CleanupIntervalMs {
    /// One sweep per default window.
    fn default() -> Self {
        Self(60_000)
    }
}

impl Deref for CleanupIntervalMs {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for CleanupIntervalMs {
    type Error = FareguardError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(FareguardError::InvalidCleanupInterval(
                "Cleanup interval must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

impl From<CleanupIntervalMs> for u64 {
    fn from(value: CleanupIntervalMs) -> Self {
        value.0
    }
}

/// Target request rate for a load-harness worker, in requests per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RequestRate(f64);

impl RequestRate {
    // caller guarantees a positive finite value
    pub(crate) const fn from_const(per_second: f64) -> Self {
        Self(per_second)
    }

    /// Gap between consecutive requests at this rate.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.0)
    }

    /// Builds a rate from a per-minute figure.
    pub fn per_minute(requests_per_minute: f64) -> Result<Self, FareguardError> {
        Self::try_from(requests_per_minute / 60.0)
    }

    /// Splits this rate evenly across `workers`.
    pub fn split(&self, workers: usize) -> Self {
        Self(self.0 / workers.max(1) as f64)
    }
}

impl Deref for RequestRate {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<f64> for RequestRate {
    type Error = FareguardError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value <= 0f64 {
            Err(FareguardError::InvalidRequestRate(
                "Request rate must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Wall-clock instant in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Creates a timestamp from whole seconds since the Unix epoch.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    /// Current system time. Clamps to the epoch if the clock is set before it.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Milliseconds since the Unix epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// `floor(now / window)`.
    pub fn window_index(&self, window: WindowSizeSeconds) -> u64 {
        self.0 / window.as_millis()
    }

    /// Milliseconds left until the window containing `self` closes.
    pub fn until_window_end(&self, window: WindowSizeSeconds) -> u64 {
        let window_ms = window.as_millis();
        window_ms - (self.0 % window_ms)
    }

    /// Returns a timestamp `millis` later.
    pub fn plus_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

/// Counter key: one entry per identity per fixed window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowKey {
    /// Bearer token of the identity.
    pub token: String,
    /// `floor(now / window_size)` at admission time.
    pub window_index: u64,
}

impl WindowKey {
    /// Key for `token` in the window containing `now`.
    pub fn new(token: &str, now: Timestamp, window: WindowSizeSeconds) -> Self {
        Self {
            token: token.to_string(),
            window_index: now.window_index(window),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// The request was admitted and counted.
    Admitted {
        /// Admissions recorded in this window, including this one.
        used: u64,
        /// Admissions allowed per window.
        limit: u64,
    },
    /// The window quota is exhausted. Nothing was counted.
    ///
    /// Includes a best-effort hint for callers that want to communicate backoff.
    Rejected {
        /// Fixed window size used for the decision.
        window_size_seconds: u64,
        /// Milliseconds until the current window closes.
        retry_after_ms: u64,
        /// Admissions allowed per window.
        limit: u64,
    },
}

impl AdmissionDecision {
    /// `true` for [`AdmissionDecision::Admitted`].
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted { .. })
    }
}

/// Shortens a bearer token for logs: first 8 characters followed by `...`.
pub fn mask_token(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...", &token[..idx]),
        None => token.to_string(),
    }
}
