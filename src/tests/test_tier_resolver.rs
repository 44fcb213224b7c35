use crate::{
    FareguardError, MAX_DENSITY_PER_REQUEST, MemoryTierResolver, Tier, TierPolicy, TierResolver,
    TierTable,
};

#[test]
fn default_tier_table() {
    let table = TierTable::default();

    for (tier, limit, density) in [(Tier::Free, 5, 1), (Tier::Plus, 15, 2), (Tier::Pro, 30, 3)] {
        let policy = table.policy(tier);
        assert_eq!(policy.limit_per_window(), limit);
        assert_eq!(policy.density_per_request(), density);
    }
}

#[test]
fn tier_policy_validates_ranges() {
    assert!(TierPolicy::new(1, 1).is_ok());
    assert!(TierPolicy::new(1, MAX_DENSITY_PER_REQUEST).is_ok());

    assert!(matches!(
        TierPolicy::new(0, 1),
        Err(FareguardError::InvalidTierPolicy(_))
    ));
    assert!(matches!(
        TierPolicy::new(5, 0),
        Err(FareguardError::InvalidTierPolicy(_))
    ));
    assert!(matches!(
        TierPolicy::new(5, MAX_DENSITY_PER_REQUEST + 1),
        Err(FareguardError::InvalidTierPolicy(_))
    ));
}

#[test]
fn tier_policy_deserialize_validates() {
    let ok: TierPolicy =
        serde_json::from_str(r#"{"limit_per_window": 7, "density_per_request": 2}"#).unwrap();
    assert_eq!(ok.limit_per_window(), 7);

    assert!(
        serde_json::from_str::<TierPolicy>(r#"{"limit_per_window": 0, "density_per_request": 2}"#)
            .is_err()
    );
}

#[test]
fn lookup_known_and_unknown_tokens() {
    let resolver = MemoryTierResolver::new(TierTable::default())
        .with_identity("a", Tier::Plus)
        .with_identity("b", Tier::Pro);

    let a = resolver.lookup("a").unwrap();
    assert_eq!(a.tier, Tier::Plus);
    assert_eq!(a.limit_per_window(), 15);
    assert_eq!(a.density_per_request(), 2);

    assert!(resolver.lookup("c").is_none());
    assert!(resolver.lookup("").is_none());
}

#[test]
fn identity_file_parsing() {
    let json = r#"[
        {"token": "tok-free", "permission_level": "free"},
        {"token": "tok-plus", "permission_level": "PLUS"},
        {"token": "tok-pro", "permission_level": "pro", "name": "ignored"},
        {"token": "tok-odd", "permission_level": "gold"},
        {"token": "tok-none"},
        {"token": "", "permission_level": "pro"}
    ]"#;

    let resolver = MemoryTierResolver::from_json_str(TierTable::default(), json).unwrap();

    assert_eq!(
        resolver.tokens(),
        vec!["tok-free", "tok-plus", "tok-pro", "tok-odd", "tok-none"]
    );
    assert_eq!(resolver.lookup("tok-plus").unwrap().tier, Tier::Plus);
    assert_eq!(resolver.lookup("tok-pro").unwrap().tier, Tier::Pro);
    assert_eq!(resolver.lookup("tok-odd").unwrap().tier, Tier::Free);
    assert_eq!(resolver.lookup("tok-none").unwrap().tier, Tier::Free);
}

#[test]
fn identity_file_rejects_malformed_json() {
    assert!(matches!(
        MemoryTierResolver::from_json_str(TierTable::default(), "{not json"),
        Err(FareguardError::Json(_))
    ));
}

#[test]
fn replacing_identity_keeps_single_entry() {
    let resolver = MemoryTierResolver::new(TierTable::default())
        .with_identity("a", Tier::Free)
        .with_identity("a", Tier::Pro);

    assert_eq!(resolver.len(), 1);
    assert_eq!(resolver.lookup("a").unwrap().tier, Tier::Pro);
}

#[test]
fn tier_names() {
    assert_eq!("Pro".parse::<Tier>(), Ok(Tier::Pro));
    assert!("enterprise".parse::<Tier>().is_err());
    assert_eq!(Tier::Plus.to_string(), "plus");
}
