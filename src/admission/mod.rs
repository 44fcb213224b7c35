//! Admission control.
//!
//! The controller keeps one counter per identity per fixed window in a sharded
//! [`DashMap`](dashmap::DashMap), and performs the check-and-increment on an
//! atomic so that concurrent callers can never push a window past its limit.
//!
//! # Key Characteristics
//!
//! - **Exact under concurrency:** `C` concurrent calls on one identity admit `min(C, limit)`
//! - **Isolated:** identities never share a counter
//! - **No side effects for unknown tokens:** resolution happens before any counter access
//! - **Bounded memory:** stale windows are evicted by an optional background loop
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use fareguard::{AdmissionController, AdmissionOptions, SystemClock};
//!
//! let controller = Arc::new(AdmissionController::new(
//!     AdmissionOptions::default(),
//!     Arc::new(SystemClock),
//! ));
//! controller.run_cleanup_loop();
//! controller.stop_cleanup_loop();
//! ```

mod fixed_window_admission;
pub use fixed_window_admission::*;

use serde::{Deserialize, Serialize};

use crate::WindowSizeSeconds;

/// Configuration for [`AdmissionController`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionOptions {
    /// Fixed window length used to derive window indices.
    #[serde(default)]
    pub window_size_seconds: WindowSizeSeconds,
}
