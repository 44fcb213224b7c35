//! Service configuration.
//!
//! All tables are loaded once at startup and are read-only afterwards. The
//! defaults are the canonical production values; a JSON file may override any
//! subset of them.
//!
//! ```json
//! {
//!   "window_size_seconds": 60,
//!   "tiers": {
//!     "free": { "limit_per_window": 5,  "density_per_request": 1 },
//!     "plus": { "limit_per_window": 15, "density_per_request": 2 },
//!     "pro":  { "limit_per_window": 30, "density_per_request": 3 }
//!   },
//!   "prices": {
//!     "routes": [
//!       { "origin": "TPE", "destination": "NRT",
//!         "prices": { "promo": [3500, 5500], "normal": [6000, 10000], "peak": [11000, 16000] } }
//!     ],
//!     "default": { "promo": [2000, 4000], "normal": [4000, 7000], "peak": [7000, 10000] }
//!   },
//!   "aliases": { "Economy": "normal" }
//! }
//! ```

use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    AdmissionController, AdmissionOptions, CleanupIntervalMs, Clock, Dispatcher, FareguardError,
    RngSeeder, SynthesisEngine, SynthesisOptions, TierResolver, TierTable, WindowSizeSeconds,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceOptions {
    /// Fixed admission window.
    #[serde(default)]
    pub window_size_seconds: WindowSizeSeconds,
    /// Sweep interval for stale admission windows.
    #[serde(default)]
    pub cleanup_interval_ms: CleanupIntervalMs,
    /// Policy per tier.
    #[serde(default)]
    pub tiers: TierTable,
    /// Price tables, aliases, roster and departure hours.
    #[serde(flatten)]
    pub synthesis: SynthesisOptions,
    /// Master seed for synthesis. Unset draws one from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ServiceOptions {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, FareguardError> {
        let options: Self = serde_json::from_str(json)?;
        // constructing the engine validates the roster and departure window
        SynthesisEngine::new(options.synthesis.clone())?;
        Ok(options)
    }

    /// Reads and validates a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FareguardError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Admission options derived from this configuration.
    pub fn admission(&self) -> AdmissionOptions {
        AdmissionOptions {
            window_size_seconds: self.window_size_seconds,
        }
    }

    /// Builds a dispatcher over `resolver`, reading time from `clock`.
    ///
    /// The eviction loop is not started; call
    /// [`AdmissionController::run_cleanup_loop_with_config`] on
    /// [`Dispatcher::admission`] to enable it.
    pub fn build_dispatcher(
        &self,
        resolver: Arc<dyn TierResolver>,
        clock: Arc<dyn Clock>,
    ) -> Result<Dispatcher, FareguardError> {
        let engine = SynthesisEngine::new(self.synthesis.clone())?;
        let admission = AdmissionController::new(self.admission(), clock);
        let seeder = match self.seed {
            Some(seed) => RngSeeder::seeded(seed),
            None => RngSeeder::from_entropy(),
        };

        tracing::info!(
            window_size_seconds = *self.window_size_seconds,
            routes = engine.prices().route_count(),
            seed = seeder.master_seed(),
            "dispatcher configured"
        );

        Ok(Dispatcher::new(
            resolver,
            Arc::new(admission),
            Arc::new(engine),
            seeder,
        ))
    }
}
