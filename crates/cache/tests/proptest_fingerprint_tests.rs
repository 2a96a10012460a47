//! Property-based tests for fingerprint and key stability.
//!
//! These tests verify the behavioral contracts of key derivation:
//! - Determinism: the same parameter set always yields the same key
//! - Order invariance: insertion order does not affect the fingerprint
//! - Sensitivity: changing a value or the namespace changes the key
//! - Parse round trip: a rendered key parses back to the same key

use pipecache_cache::{CacheKey, ParamValue, Params, fingerprint_params};
use proptest::prelude::*;

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Generate parameter names like `n_estimators` or `max_depth`
fn param_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(String::from)
}

/// Generate finite scalar parameter values
fn param_value_strategy() -> impl Strategy<Value = ParamValue> {
    prop_oneof![
        Just(ParamValue::Null),
        any::<bool>().prop_map(ParamValue::Bool),
        any::<i64>().prop_map(ParamValue::Int),
        (-1.0e9f64..1.0e9f64).prop_map(ParamValue::Float),
        "[a-zA-Z0-9 _.-]{0,20}".prop_map(ParamValue::Str),
    ]
}

/// Generate a list of distinct parameter entries
fn entries_strategy() -> impl Strategy<Value = Vec<(String, ParamValue)>> {
    prop::collection::btree_map(param_name_strategy(), param_value_strategy(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

/// Generate valid namespaces such as `models/rf`
fn namespace_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9_.-]{0,10}", 1..4).prop_map(|segs| segs.join("/"))
}

// =============================================================================
// Property Tests: Determinism and order invariance
// =============================================================================

proptest! {
    /// Contract: fingerprinting is a pure function of the parameter set
    #[test]
    fn prop_fingerprint_deterministic(entries in entries_strategy()) {
        let a: Params = entries.clone().into_iter().collect();
        let b: Params = entries.into_iter().collect();
        prop_assert_eq!(fingerprint_params(&a).unwrap(), fingerprint_params(&b).unwrap());
    }

    /// Contract: insertion order is irrelevant
    #[test]
    fn prop_fingerprint_order_invariant(entries in entries_strategy()) {
        let forward: Params = entries.clone().into_iter().collect();
        let backward: Params = entries.into_iter().rev().collect();
        prop_assert_eq!(
            fingerprint_params(&forward).unwrap(),
            fingerprint_params(&backward).unwrap()
        );
    }
}

// =============================================================================
// Property Tests: Sensitivity
// =============================================================================

proptest! {
    /// Contract: adding a parameter changes the fingerprint
    #[test]
    fn prop_extra_param_changes_fingerprint(
        entries in entries_strategy(),
        value in param_value_strategy(),
    ) {
        let base: Params = entries.into_iter().collect();
        prop_assume!(base.get("zz_extra").is_none());
        let extended = base.clone().with("zz_extra", value);
        prop_assert_ne!(
            fingerprint_params(&base).unwrap(),
            fingerprint_params(&extended).unwrap()
        );
    }

    /// Contract: changing an integer value changes the fingerprint
    #[test]
    fn prop_int_change_changes_fingerprint(
        name in param_name_strategy(),
        a in any::<i64>(),
        b in any::<i64>(),
    ) {
        prop_assume!(a != b);
        let pa = Params::new().with(name.clone(), a);
        let pb = Params::new().with(name, b);
        prop_assert_ne!(fingerprint_params(&pa).unwrap(), fingerprint_params(&pb).unwrap());
    }

    /// Contract: the namespace is part of the key
    #[test]
    fn prop_namespace_changes_key(
        ns_a in namespace_strategy(),
        ns_b in namespace_strategy(),
        entries in entries_strategy(),
    ) {
        prop_assume!(ns_a != ns_b);
        let params: Params = entries.into_iter().collect();
        let a = CacheKey::build(&ns_a, &params, None).unwrap();
        let b = CacheKey::build(&ns_b, &params, None).unwrap();
        prop_assert_ne!(a.as_str(), b.as_str());
        prop_assert_eq!(a.params_fingerprint(), b.params_fingerprint());
    }
}

// =============================================================================
// Property Tests: Key rendering
// =============================================================================

proptest! {
    /// Contract: rendered keys parse back into the same key
    #[test]
    fn prop_key_parse_roundtrip(ns in namespace_strategy(), entries in entries_strategy()) {
        let params: Params = entries.into_iter().collect();
        let key = CacheKey::build(&ns, &params, None).unwrap();
        let parsed = CacheKey::parse(key.as_str()).unwrap();
        prop_assert_eq!(parsed, key);
    }
}
