// SPDX-License-Identifier: MIT

//! Orchestrator configuration with startup clamping.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_coding_concurrency: u32,
    pub max_total_agents: u32,
    pub testing_agent_ratio: u32,
    pub count_testing_towards_cap: bool,
    pub yolo_mode: bool,
    pub poll_interval_ms: u64,
    pub max_feature_retries: u32,
    pub initializer_timeout_secs: u64,
    pub claim_max_attempts: u32,
    pub kill_tree_grace_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_coding_concurrency: 3,
            max_total_agents: 10,
            testing_agent_ratio: 1,
            count_testing_towards_cap: false,
            yolo_mode: false,
            poll_interval_ms: 5_000,
            max_feature_retries: 3,
            initializer_timeout_secs: 1_800,
            claim_max_attempts: 10,
            kill_tree_grace_secs: 5,
        }
    }
}

/// Documented legal range for a single clamped field.
struct Bound {
    field: &'static str,
    min: u64,
    max: u64,
}

const BOUNDS: &[Bound] = &[
    Bound { field: "max_coding_concurrency", min: 1, max: 64 },
    Bound { field: "max_total_agents", min: 1, max: 256 },
    Bound { field: "testing_agent_ratio", min: 0, max: 16 },
    Bound { field: "poll_interval_ms", min: 100, max: 300_000 },
    Bound { field: "max_feature_retries", min: 1, max: 20 },
    Bound { field: "initializer_timeout_secs", min: 1, max: 86_400 },
    Bound { field: "claim_max_attempts", min: 1, max: 1_000 },
    Bound { field: "kill_tree_grace_secs", min: 1, max: 300 },
];

fn bound_for(field: &str) -> &'static Bound {
    BOUNDS
        .iter()
        .find(|b| b.field == field)
        .unwrap_or_else(|| unreachable!("no bound registered for config field {field}"))
}

fn clamp_u64(field: &'static str, value: u64, notices: &mut Vec<ClampNotice>) -> u64 {
    let bound = bound_for(field);
    let clamped = value.clamp(bound.min, bound.max);
    if clamped != value {
        notices.push(ClampNotice { field: field.to_string(), requested: value, clamped_to: clamped });
    }
    clamped
}

/// A single field that was outside its documented range and was silently
/// clamped to the nearest legal value, published as a startup event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClampNotice {
    pub field: String,
    pub requested: u64,
    pub clamped_to: u64,
}

impl Config {
    /// Validate and clamp every field to its documented range, returning
    /// the clamped config plus the list of fields that were out of range.
    pub fn clamp(self) -> (Self, Vec<ClampNotice>) {
        let mut notices = Vec::new();
        let max_coding_concurrency =
            clamp_u64("max_coding_concurrency", u64::from(self.max_coding_concurrency), &mut notices)
                as u32;
        let mut max_total_agents =
            clamp_u64("max_total_agents", u64::from(self.max_total_agents), &mut notices) as u32;
        if max_total_agents < max_coding_concurrency {
            notices.push(ClampNotice {
                field: "max_total_agents".to_string(),
                requested: u64::from(max_total_agents),
                clamped_to: u64::from(max_coding_concurrency),
            });
            max_total_agents = max_coding_concurrency;
        }
        let testing_agent_ratio =
            clamp_u64("testing_agent_ratio", u64::from(self.testing_agent_ratio), &mut notices)
                as u32;
        let poll_interval_ms = clamp_u64("poll_interval_ms", self.poll_interval_ms, &mut notices);
        let max_feature_retries =
            clamp_u64("max_feature_retries", u64::from(self.max_feature_retries), &mut notices)
                as u32;
        let initializer_timeout_secs =
            clamp_u64("initializer_timeout_secs", self.initializer_timeout_secs, &mut notices);
        let claim_max_attempts =
            clamp_u64("claim_max_attempts", u64::from(self.claim_max_attempts), &mut notices)
                as u32;
        let kill_tree_grace_secs =
            clamp_u64("kill_tree_grace_secs", self.kill_tree_grace_secs, &mut notices);

        (
            Self {
                max_coding_concurrency,
                max_total_agents,
                testing_agent_ratio,
                count_testing_towards_cap: self.count_testing_towards_cap,
                yolo_mode: self.yolo_mode,
                poll_interval_ms,
                max_feature_retries,
                initializer_timeout_secs,
                claim_max_attempts,
                kill_tree_grace_secs,
            },
            notices,
        )
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn initializer_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.initializer_timeout_secs)
    }

    pub fn kill_tree_grace(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.kill_tree_grace_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
