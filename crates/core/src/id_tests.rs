// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn display_renders_bare_integer() {
    assert_eq!(FeatureId::new(42).to_string(), "42");
}

#[test]
fn ordering_is_numeric() {
    let mut ids = vec![FeatureId::new(10), FeatureId::new(2), FeatureId::new(3)];
    ids.sort();
    assert_eq!(ids, vec![FeatureId::new(2), FeatureId::new(3), FeatureId::new(10)]);
}

#[test]
fn none_sentinel_is_zero() {
    assert_eq!(FeatureId::NONE.get(), 0);
}

#[test]
fn roundtrips_through_json() {
    let id = FeatureId::new(7);
    let json = serde_json::to_string(&id).expect("serialize");
    assert_eq!(json, "7");
    let parsed: FeatureId = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(parsed, id);
}
