use std::{
    collections::{BTreeMap, VecDeque},
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Local};

use crate::{FareguardError, FlightQuery, RequestOutcome, mask_token};

/// Endpoint name written into every log line.
pub const FLIGHTS_ENDPOINT: &str = "/flights";

/// Entries a [`RunLog`] keeps in memory unless told otherwise.
pub const DEFAULT_RUN_LOG_TAIL: usize = 10_000;

/// One harness call as it appears in the run log.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLogEntry {
    /// When the call finished.
    pub timestamp: DateTime<Local>,
    /// Masked bearer token.
    pub token: String,
    /// Classified result.
    pub outcome: RequestOutcome,
    /// Query parameters that were sent.
    pub params: BTreeMap<&'static str, String>,
    /// Round-trip time.
    pub latency: Duration,
}

impl RunLogEntry {
    /// Entry stamped with the current local time. The token is masked here.
    pub fn new(token: &str, outcome: RequestOutcome, query: &FlightQuery, latency: Duration) -> Self {
        Self {
            timestamp: Local::now(),
            token: mask_token(token),
            outcome,
            params: query.to_params(),
            latency,
        }
    }

    /// `<timestamp> [API_REQUEST] token=<masked> status=<outcome> endpoint=/flights params=<json>`
    pub fn to_line(&self) -> String {
        let params = serde_json::to_string(&self.params).unwrap_or_else(|_| "{}".to_string());
        format!(
            "{} [API_REQUEST] token={} status={} endpoint={} params={}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.token,
            self.outcome,
            FLIGHTS_ENDPOINT,
            params
        )
    }
}

/// Per-call record of a harness run.
///
/// Memory holds only the most recent entries (the tail); the optional file
/// sink receives every line.
pub struct RunLog {
    entries: Mutex<VecDeque<RunLogEntry>>,
    tail: usize,
    appended: AtomicU64,
    sink: Option<Mutex<BufWriter<File>>>,
}

impl RunLog {
    /// Log without a file.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            tail: DEFAULT_RUN_LOG_TAIL,
            appended: AtomicU64::new(0),
            sink: None,
        }
    }

    /// Log that also appends lines to `path`, creating it if needed.
    pub fn with_file(path: impl AsRef<Path>) -> Result<Self, FareguardError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Some(Mutex::new(BufWriter::new(file))),
            ..Self::in_memory()
        })
    }

    /// Keep at most `tail` entries in memory. Zero keeps none.
    pub fn with_tail(mut self, tail: usize) -> Self {
        self.tail = tail;
        self
    }

    /// Records one call. A failed file write is logged and otherwise ignored.
    pub fn append(&self, entry: RunLogEntry) {
        self.appended.fetch_add(1, Ordering::Relaxed);

        if let Some(sink) = &self.sink {
            let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = writeln!(sink, "{}", entry.to_line()) {
                tracing::warn!(error = ?err, "failed to write run log line");
            }
        }

        if self.tail == 0 {
            return;
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.tail {
            entries.pop_front();
        }
        entries.push_back(entry);
    } // end method append

    /// Calls recorded so far, including entries dropped from the tail.
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }

    /// Copy of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<RunLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// `true` if no entry is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes buffered file output.
    pub fn flush(&self) -> Result<(), FareguardError> {
        if let Some(sink) = &self.sink {
            sink.lock().unwrap_or_else(PoisonError::into_inner).flush()?;
        }
        Ok(())
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::in_memory()
    }
}
