use std::sync::Arc;

use crate::{
    Category, FareguardError, FlightQuery, ManualClock, MemoryTierResolver, PriceRange,
    ServiceOptions, Tier, Timestamp,
};

#[test]
fn empty_document_yields_defaults() {
    let options = ServiceOptions::from_json_str("{}").unwrap();
    assert_eq!(options, ServiceOptions::default());
    assert_eq!(*options.window_size_seconds, 60);
    assert_eq!(options.synthesis.prices.route_count(), 4);
    assert_eq!(options.synthesis.airlines.len(), 8);
}

#[test]
fn overrides_are_applied() {
    let json = r#"{
        "window_size_seconds": 10,
        "tiers": {
            "free": { "limit_per_window": 2, "density_per_request": 1 },
            "plus": { "limit_per_window": 4, "density_per_request": 2 },
            "pro":  { "limit_per_window": 8, "density_per_request": 4 }
        },
        "prices": {
            "routes": [
                { "origin": "TPE", "destination": "HND",
                  "prices": { "promo": [1000, 1000], "normal": [2000, 2000], "peak": [3000, 3000] } }
            ],
            "default": { "promo": [100, 200], "normal": [300, 400], "peak": [500, 600] }
        },
        "aliases": { "Lite": "promo" },
        "seed": 5
    }"#;

    let options = ServiceOptions::from_json_str(json).unwrap();
    assert_eq!(*options.window_size_seconds, 10);
    assert_eq!(options.tiers.policy(Tier::Pro).density_per_request(), 4);
    assert_eq!(options.seed, Some(5));
    assert_eq!(
        options.synthesis.prices.range_for("TPE", "HND", Category::Peak),
        PriceRange::new(3000, 3000).unwrap()
    );
    assert_eq!(
        options.synthesis.prices.range_for("TPE", "NRT", Category::Peak),
        PriceRange::new(500, 600).unwrap()
    );
    assert_eq!(options.synthesis.aliases.resolve("lite"), Some(Category::Promo));
    assert_eq!(options.synthesis.aliases.resolve("Economy"), None);
}

#[test]
fn invalid_values_are_rejected() {
    assert!(ServiceOptions::from_json_str(r#"{"window_size_seconds": 0}"#).is_err());
    assert!(ServiceOptions::from_json_str(r#"{"cleanup_interval_ms": 0}"#).is_err());
    assert!(
        ServiceOptions::from_json_str(
            r#"{"prices": {"default": {"promo": [500, 100]}}}"#
        )
        .is_err()
    );
    assert!(
        ServiceOptions::from_json_str(
            r#"{"prices": {"routes": [{"origin": "tpe", "destination": "NRT", "prices": {}}], "default": {}}}"#
        )
        .is_err()
    );
    assert!(matches!(
        ServiceOptions::from_json_str(r#"{"airlines": []}"#),
        Err(FareguardError::InvalidSchedule(_))
    ));
}

#[test]
fn built_dispatcher_uses_configured_window_and_tiers() {
    let json = r#"{
        "window_size_seconds": 10,
        "tiers": {
            "free": { "limit_per_window": 2, "density_per_request": 1 },
            "plus": { "limit_per_window": 4, "density_per_request": 2 },
            "pro":  { "limit_per_window": 8, "density_per_request": 4 }
        },
        "seed": 1
    }"#;
    let options = ServiceOptions::from_json_str(json).unwrap();
    let resolver = MemoryTierResolver::new(options.tiers).with_identity("t", Tier::Free);
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(100)));
    let dispatcher = options
        .build_dispatcher(Arc::new(resolver), clock.clone())
        .unwrap();

    let query = FlightQuery::from_params([("from", "TPE"), ("to", "NRT"), ("date", "2026-11-02")]);
    assert!(dispatcher.dispatch("t", &query).is_ok());
    assert!(dispatcher.dispatch("t", &query).is_ok());
    assert!(dispatcher.dispatch("t", &query).is_err());

    clock.advance(10_000);
    assert!(dispatcher.dispatch("t", &query).is_ok());
    assert_eq!(*dispatcher.admission().window_size_seconds(), 10);
}

#[test]
fn options_round_trip_through_json() {
    let options = ServiceOptions::default();
    let json = serde_json::to_string(&options).unwrap();
    assert_eq!(ServiceOptions::from_json_str(&json).unwrap(), options);
}
