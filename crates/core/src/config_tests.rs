// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn defaults_match_spec_table() {
    let cfg = Config::default();
    assert_eq!(cfg.max_coding_concurrency, 3);
    assert_eq!(cfg.max_total_agents, 10);
    assert_eq!(cfg.testing_agent_ratio, 1);
    assert!(!cfg.count_testing_towards_cap);
    assert!(!cfg.yolo_mode);
    assert_eq!(cfg.poll_interval_ms, 5_000);
    assert_eq!(cfg.max_feature_retries, 3);
    assert_eq!(cfg.initializer_timeout_secs, 1_800);
    assert_eq!(cfg.claim_max_attempts, 10);
    assert_eq!(cfg.kill_tree_grace_secs, 5);
}

#[test]
fn defaults_clamp_to_themselves_with_no_notices() {
    let (clamped, notices) = Config::default().clamp();
    assert_eq!(clamped, Config::default());
    assert!(notices.is_empty());
}

#[test]
fn out_of_range_values_are_clamped_and_reported() {
    let cfg = Config { max_coding_concurrency: 0, poll_interval_ms: 1, ..Config::default() };
    let (clamped, notices) = cfg.clamp();
    assert_eq!(clamped.max_coding_concurrency, 1);
    assert_eq!(clamped.poll_interval_ms, 100);
    assert!(notices.iter().any(|n| n.field == "max_coding_concurrency"));
    assert!(notices.iter().any(|n| n.field == "poll_interval_ms"));
}

#[test]
fn total_agents_is_raised_to_at_least_coding_concurrency() {
    let cfg = Config { max_coding_concurrency: 20, max_total_agents: 5, ..Config::default() };
    let (clamped, notices) = cfg.clamp();
    assert_eq!(clamped.max_total_agents, 20);
    assert!(notices.iter().any(|n| n.field == "max_total_agents"));
}

#[test]
fn testing_ratio_of_zero_is_within_range() {
    let cfg = Config { testing_agent_ratio: 0, ..Config::default() };
    let (clamped, notices) = cfg.clamp();
    assert_eq!(clamped.testing_agent_ratio, 0);
    assert!(!notices.iter().any(|n| n.field == "testing_agent_ratio"));
}
