use std::{str::FromStr, time::Duration};

use crate::{FareguardError, RequestRate};

/// Sustained phase, pause, then burst phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixedPlan {
    /// Length of the sustained phase.
    pub sustained_duration: Duration,
    /// Rate of the sustained phase.
    pub sustained_rate: RequestRate,
    /// Idle gap between phases.
    pub pause: Duration,
    /// Length of the burst phase.
    pub burst_duration: Duration,
    /// Rate of the burst phase.
    pub burst_rate: RequestRate,
}

impl Default for MixedPlan {
    /// 30 s at 5 per minute, 5 s pause, 60 s at 10 per second.
    fn default() -> Self {
        Self {
            sustained_duration: Duration::from_secs(30),
            sustained_rate: RequestRate::from_const(5.0 / 60.0),
            pause: Duration::from_secs(5),
            burst_duration: Duration::from_secs(60),
            burst_rate: RequestRate::from_const(10.0),
        }
    }
}

/// A traffic pattern the harness can run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scenario {
    /// One worker, a random identity per request.
    Sustained {
        /// How long to run.
        duration: Duration,
        /// Target rate.
        rate: RequestRate,
    },
    /// One worker hammering a single identity.
    Burst {
        /// How long to run.
        duration: Duration,
        /// Target rate.
        rate: RequestRate,
    },
    /// One worker per identity, the total rate split evenly.
    Distributed {
        /// How long to run.
        duration: Duration,
        /// Combined rate across all workers.
        total_rate: RequestRate,
    },
    /// [`MixedPlan`] phases in order.
    Mixed(MixedPlan),
}

impl Scenario {
    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Sustained { .. } => "sustained",
            Scenario::Burst { .. } => "burst",
            Scenario::Distributed { .. } => "distributed",
            Scenario::Mixed(_) => "mixed",
        }
    }
}

/// Scenario selector as given on a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    /// See [`Scenario::Sustained`]. Also accepted as `normal`.
    Sustained,
    /// See [`Scenario::Burst`].
    Burst,
    /// See [`Scenario::Distributed`].
    Distributed,
    /// See [`Scenario::Mixed`].
    Mixed,
}

impl ScenarioKind {
    /// Concrete scenario. `Mixed` ignores `duration` and `rate` and uses
    /// [`MixedPlan::default`].
    pub fn into_scenario(self, duration: Duration, rate: f64) -> Result<Scenario, FareguardError> {
        if duration.is_zero() && self != ScenarioKind::Mixed {
            return Err(FareguardError::InvalidSchedule(
                "Scenario duration must be greater than 0".to_string(),
            ));
        }

        Ok(match self {
            ScenarioKind::Sustained => Scenario::Sustained {
                duration,
                rate: RequestRate::try_from(rate)?,
            },
            ScenarioKind::Burst => Scenario::Burst {
                duration,
                rate: RequestRate::try_from(rate)?,
            },
            ScenarioKind::Distributed => Scenario::Distributed {
                duration,
                total_rate: RequestRate::try_from(rate)?,
            },
            ScenarioKind::Mixed => Scenario::Mixed(MixedPlan::default()),
        })
    }
}

impl FromStr for ScenarioKind {
    type Err = FareguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sustained" | "normal" => Ok(ScenarioKind::Sustained),
            "burst" => Ok(ScenarioKind::Burst),
            "distributed" => Ok(ScenarioKind::Distributed),
            "mixed" => Ok(ScenarioKind::Mixed),
            other => Err(FareguardError::InvalidSchedule(format!(
                "Unknown scenario {other:?}"
            ))),
        }
    }
}
