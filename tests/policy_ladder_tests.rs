//! Monotonic policy ladder properties: for every pair of zones, the stricter
//! one never relaxes a requirement relative to the less strict one.

use zonegate::policy::{SecurityZone, ZonePolicyTable};

#[test]
fn ladder_is_monotone_across_all_zone_pairs() {
    let table = ZonePolicyTable::builtin();
    for (i, lo) in SecurityZone::ALL.iter().enumerate() {
        for hi in SecurityZone::ALL.iter().skip(i + 1) {
            let a = table.get(*lo);
            let b = table.get(*hi);
            assert!(
                b.min_clearance_level >= a.min_clearance_level,
                "{hi} must require at least the clearance of {lo}"
            );
            assert!(
                b.required_credentials.is_superset(&a.required_credentials),
                "{hi} must require every credential {lo} requires"
            );
            assert!(
                b.session_timeout_secs <= a.session_timeout_secs,
                "{hi} sessions must not outlive {lo} sessions"
            );
            assert!(
                b.max_failed_attempts <= a.max_failed_attempts,
                "{hi} must not tolerate more failures than {lo}"
            );
            assert!(
                b.cooldown_secs >= a.cooldown_secs,
                "{hi} must not cool down faster than {lo}"
            );
            assert!(!(a.mfa_required && !b.mfa_required));
            assert!(!(a.biometric_required && !b.biometric_required));
            assert!(!(a.ai_verification_required && !b.ai_verification_required));
            assert!(!(a.continuous_monitoring && !b.continuous_monitoring));
        }
    }
}

#[test]
fn clearance_levels_match_zone_order() {
    for (i, zone) in SecurityZone::ALL.iter().enumerate() {
        assert_eq!(zone.clearance_level() as usize, i);
    }
    let table = ZonePolicyTable::builtin();
    for zone in SecurityZone::ALL {
        assert_eq!(table.get(zone).min_clearance_level, zone.clearance_level());
    }
}

#[test]
fn monitored_zones_demand_every_factor() {
    let table = ZonePolicyTable::builtin();
    for (zone, reqs) in table.iter() {
        if reqs.continuous_monitoring {
            assert!(reqs.biometric_required, "{zone} monitors but skips biometrics");
            assert!(reqs.ai_verification_required, "{zone} monitors but skips trust scoring");
        }
    }
}

#[test]
fn requirements_serialize_for_the_policy_endpoint() {
    let table = ZonePolicyTable::builtin();
    let v = serde_json::to_value(table.get(SecurityZone::Restricted)).unwrap();
    assert_eq!(v["min_clearance_level"], 1);
    assert_eq!(v["max_failed_attempts"], 3);
    assert!(v["required_credentials"].as_array().unwrap().iter().any(|c| c == "nda"));
}
