//! Synthetic inventory generation.
//!
//! Records are produced on demand from immutable price tables. Nothing is
//! cached between calls and the engine keeps no generator of its own: callers
//! pass one in, typically from an [`RngSeeder`](crate::RngSeeder), which keeps
//! concurrent synthesis free of shared mutable state.
//!
//! # Examples
//!
//! ```
//! use fareguard::{
//!     PriceBounds, RouteConstraint, SynthesisEngine, SynthesisOptions, SynthesisRequest,
//! };
//!
//! let engine = SynthesisEngine::new(SynthesisOptions::default()).unwrap();
//! let request = SynthesisRequest {
//!     route: Some(RouteConstraint {
//!         origin: "TPE".to_string(),
//!         destination: "NRT".to_string(),
//!         date: "2026-11-02".to_string(),
//!     }),
//!     category: Some("promo".to_string()),
//!     bounds: PriceBounds::new(4000, 5000),
//!     count: 3,
//! };
//!
//! for record in engine.synthesize_seeded(&request, 7) {
//!     assert!((4000..=5000).contains(&record.price));
//!     assert_eq!(record.price % 100, 0);
//! }
//! ```

mod category;
pub use category::*;

mod engine;
pub use engine::*;

mod price_table;
pub use price_table::*;
