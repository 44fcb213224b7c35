use std::sync::Arc;

use crate::{
    Clock, DispatchError, Dispatcher, FlightQuery, ManualClock, MemoryTierResolver, ServiceOptions, Tier,
    Timestamp, bearer_token,
};

fn dispatcher() -> (Arc<ManualClock>, Dispatcher) {
    let options = ServiceOptions {
        seed: Some(21),
        ..ServiceOptions::default()
    };
    let resolver = MemoryTierResolver::new(options.tiers)
        .with_identity("free-token", Tier::Free)
        .with_identity("plus-token", Tier::Plus)
        .with_identity("pro-token", Tier::Pro);
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(60_000)));

    let dispatcher = options
        .build_dispatcher(Arc::new(resolver), clock.clone())
        .unwrap();
    (clock, dispatcher)
}

fn query() -> FlightQuery {
    FlightQuery::from_params([("from", "TPE"), ("to", "NRT"), ("date", "2026-11-02")])
}

#[test]
fn unknown_token_is_unauthorized_and_counts_nothing() {
    let (_clock, dispatcher) = dispatcher();

    let err = dispatcher.dispatch("nobody", &query()).unwrap_err();
    assert_eq!(err, DispatchError::Unauthorized);
    assert_eq!(err.status_code(), 401);
    assert!(dispatcher.admission().snapshot().is_empty());
}

#[test]
fn density_follows_tier() {
    let (_clock, dispatcher) = dispatcher();

    assert_eq!(dispatcher.dispatch("free-token", &query()).unwrap().len(), 1);
    assert_eq!(dispatcher.dispatch("plus-token", &query()).unwrap().len(), 2);
    assert_eq!(dispatcher.dispatch("pro-token", &query()).unwrap().len(), 3);
}

#[test]
fn sixth_free_request_in_window_is_rejected() {
    let (clock, dispatcher) = dispatcher();

    for _ in 0..5 {
        dispatcher.dispatch("free-token", &query()).unwrap();
    }

    clock.advance(15_000);
    let err = dispatcher.dispatch("free-token", &query()).unwrap_err();
    assert_eq!(
        err,
        DispatchError::TooManyRequests {
            retry_after_ms: 45_000,
            limit: 5
        }
    );
    assert_eq!(err.status_code(), 429);

    // other identities are unaffected
    assert!(dispatcher.dispatch("plus-token", &query()).is_ok());

    clock.advance(45_000);
    assert!(dispatcher.dispatch("free-token", &query()).is_ok());
}

#[test]
fn malformed_price_is_rejected_without_consuming_quota() {
    let (clock, dispatcher) = dispatcher();
    let bad = FlightQuery::from_params([
        ("from", "TPE"),
        ("to", "NRT"),
        ("date", "2026-11-02"),
        ("min_price", "cheap"),
    ]);

    let err = dispatcher.dispatch("free-token", &bad).unwrap_err();
    assert_eq!(
        err,
        DispatchError::MalformedInput {
            field: "min_price",
            value: "cheap".to_string()
        }
    );
    assert_eq!(err.status_code(), 400);
    assert_eq!(dispatcher.admission().used("free-token", clock.now()), 0);
}

#[test]
fn missing_route_consumes_quota_and_returns_nothing() {
    let (clock, dispatcher) = dispatcher();
    let partial = FlightQuery::from_params([("from", "TPE"), ("type", "promo")]);

    assert!(dispatcher.dispatch("free-token", &partial).unwrap().is_empty());
    assert_eq!(dispatcher.admission().used("free-token", clock.now()), 1);
}

#[test]
fn price_bounds_and_category_are_applied() {
    let (_clock, dispatcher) = dispatcher();
    let q = FlightQuery::from_params([
        ("from", "tpe"),
        ("to", "nrt"),
        ("date", "2026-11-02"),
        ("type", "Saver"),
        ("min_price", "4000"),
        ("max_price", "5000"),
    ]);

    let records = dispatcher.dispatch("pro-token", &q).unwrap();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.origin, "TPE");
        assert_eq!(record.destination, "NRT");
        assert!((4000..=5000).contains(&record.price));
    }
}

#[test]
fn query_params_round_trip_and_ignore_unknown_keys() {
    let q = FlightQuery::from_params([
        ("from", "TPE"),
        ("to", "SIN"),
        ("page", "2"),
        ("max_price", "8000"),
    ]);

    assert_eq!(q.origin.as_deref(), Some("TPE"));
    assert_eq!(q.max_price.as_deref(), Some("8000"));
    assert!(q.route().is_none());

    let params = q.to_params();
    assert_eq!(params.len(), 3);
    assert_eq!(params["to"], "SIN");
    assert!(!params.contains_key("page"));
}

#[test]
fn price_bounds_default_when_absent() {
    let bounds = FlightQuery::default().price_bounds().unwrap();
    assert_eq!((bounds.min, bounds.max), (0, 99_999));
}

#[test]
fn bearer_prefix_is_optional() {
    assert_eq!(bearer_token("Bearer abc123"), "abc123");
    assert_eq!(bearer_token("  abc123 "), "abc123");
    assert_eq!(bearer_token("Bearer   padded"), "padded");
}

#[test]
fn json_response_uses_wire_field_names() {
    let (_clock, dispatcher) = dispatcher();
    let records = dispatcher.dispatch("free-token", &query()).unwrap();

    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["from"], "TPE");
    assert_eq!(json["to"], "NRT");
    assert!(json["type"].is_string());
    assert!(json["price"].is_i64());
}
