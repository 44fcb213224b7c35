#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod common;
pub use common::{
    AdmissionDecision, CleanupIntervalMs, RequestRate, Timestamp, WindowKey, WindowSizeSeconds,
    mask_token,
};

mod clock;
pub use clock::*;

mod rng;
pub use rng::*;

mod tier;
pub use tier::*;

mod admission;
pub use admission::*;

mod synthesis;
pub use synthesis::*;

mod dispatcher;
pub use dispatcher::*;

mod config;
pub use config::*;

mod harness;
pub use harness::*;

#[cfg(test)]
mod tests;
