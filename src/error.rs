/// Error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum FareguardError {
    /// A window size was zero.
    #[error("{0}")]
    InvalidWindowSize(String),

    /// A cleanup interval was zero.
    #[error("{0}")]
    InvalidCleanupInterval(String),

    /// A tier policy had a limit or density outside its allowed range.
    #[error("{0}")]
    InvalidTierPolicy(String),

    /// A price range had `min > max`.
    #[error("{0}")]
    InvalidPriceRange(String),

    /// An airport code was not three uppercase ASCII letters.
    #[error("{0}")]
    InvalidAirportCode(String),

    /// A request rate was not a positive finite number.
    #[error("{0}")]
    InvalidRequestRate(String),

    /// The departure window or airline roster cannot produce a flight.
    #[error("{0}")]
    InvalidSchedule(String),

    /// The load harness was given no identities to drive.
    #[error("identity pool is empty")]
    EmptyIdentityPool,

    /// I/O error while reading configuration or writing the run log.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Latency histogram could not be created.
    #[error("histogram error: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
}

impl PartialEq<&str> for FareguardError {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

/// Request-level rejection produced by the [`Dispatcher`](crate::Dispatcher).
///
/// Every variant is terminal for the request; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The bearer token does not resolve to an identity.
    #[error("invalid or unknown token")]
    Unauthorized,

    /// The identity's quota for the current window is exhausted.
    #[error("too many requests, retry after {retry_after_ms}ms")]
    TooManyRequests {
        /// Milliseconds until the current window closes.
        retry_after_ms: u64,
        /// Admissions allowed per window for this identity.
        limit: u64,
    },

    /// A numeric query parameter failed to parse.
    #[error("malformed {field}: {value:?}")]
    MalformedInput {
        /// Name of the offending parameter.
        field: &'static str,
        /// Raw value as received.
        value: String,
    },
}

impl DispatchError {
    /// HTTP-equivalent status code for this rejection.
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::Unauthorized => 401,
            DispatchError::TooManyRequests { .. } => 429,
            DispatchError::MalformedInput { .. } => 400,
        }
    }
}
