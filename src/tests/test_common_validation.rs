use std::time::Duration;

use crate::{
    CleanupIntervalMs, RequestRate, Timestamp, WindowKey, WindowSizeSeconds, mask_token,
};

#[test]
fn window_size_seconds_try_from_validates_min_1() {
    let w = WindowSizeSeconds::try_from(1u64).unwrap();
    assert_eq!(*w, 1u64);
    assert_eq!(w.as_millis(), 1_000);

    assert_eq!(
        WindowSizeSeconds::try_from(0u64).unwrap_err(),
        "Window size must be at least 1"
    );

    assert_eq!(*WindowSizeSeconds::default(), 60);
}

#[test]
fn window_size_seconds_deserialize_validates() {
    let w: WindowSizeSeconds = serde_json::from_str("30").unwrap();
    assert_eq!(*w, 30);

    assert!(serde_json::from_str::<WindowSizeSeconds>("0").is_err());
}

#[test]
fn cleanup_interval_ms_try_from_validates_nonzero() {
    let c = CleanupIntervalMs::try_from(1u64).unwrap();
    assert_eq!(*c, 1u64);

    assert_eq!(
        CleanupIntervalMs::try_from(0u64).unwrap_err(),
        "Cleanup interval must be greater than 0"
    );
}

#[test]
fn request_rate_try_from_validates_positive() {
    let r = RequestRate::try_from(4f64).unwrap();
    assert_eq!(*r, 4f64);
    assert_eq!(r.interval(), Duration::from_millis(250));

    assert_eq!(
        RequestRate::try_from(0f64).unwrap_err(),
        "Request rate must be greater than 0"
    );
    assert_eq!(
        RequestRate::try_from(-1f64).unwrap_err(),
        "Request rate must be greater than 0"
    );
    assert!(RequestRate::try_from(f64::NAN).is_err());
    assert!(RequestRate::try_from(f64::INFINITY).is_err());
}

#[test]
fn request_rate_per_minute_and_split() {
    let r = RequestRate::per_minute(120.0).unwrap();
    assert_eq!(*r, 2.0);

    let split = RequestRate::try_from(10.0).unwrap().split(5);
    assert_eq!(*split, 2.0);

    // zero workers behaves like one
    assert_eq!(*RequestRate::try_from(3.0).unwrap().split(0), 3.0);
}

#[test]
fn timestamp_window_arithmetic() {
    let window = WindowSizeSeconds::try_from(60).unwrap();

    let start = Timestamp::from_secs(120);
    assert_eq!(start.window_index(window), 2);
    assert_eq!(start.until_window_end(window), 60_000);

    let late = start.plus_millis(59_999);
    assert_eq!(late.window_index(window), 2);
    assert_eq!(late.until_window_end(window), 1);

    assert_eq!(late.plus_millis(1).window_index(window), 3);
}

#[test]
fn window_key_uses_floor_of_now_over_window() {
    let window = WindowSizeSeconds::try_from(10).unwrap();
    let key = WindowKey::new("tok", Timestamp::from_millis(25_999), window);

    assert_eq!(key.token, "tok");
    assert_eq!(key.window_index, 2);
}

#[test]
fn mask_token_keeps_first_eight_chars() {
    assert_eq!(mask_token("abcdefghijkl"), "abcdefgh...");
    assert_eq!(mask_token("abcdefgh"), "abcdefgh");
    assert_eq!(mask_token("short"), "short");
    assert_eq!(mask_token(""), "");
}
