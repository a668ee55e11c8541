// SPDX-License-Identifier: MIT

//! Text/JSON rendering for events and snapshots printed to stdout.

use clap::ValueEnum;
use pao_core::{Event, FeatureState, Snapshot};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Prints one line per event, in the format the operator asked for.
pub fn print_event(event: &Event, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        }
        OutputFormat::Text => print_event_text(event),
    }
}

fn print_event_text(event: &Event) {
    match event {
        Event::OrchestratorStarted { clamps, .. } => {
            println!("orchestrator started");
            for clamp in clamps {
                println!(
                    "  note: {} clamped from {} to {}",
                    clamp.field, clamp.requested, clamp.clamped_to
                );
            }
        }
        Event::OrchestratorStopped { reason } => println!("orchestrator stopped: {reason:?}"),
        Event::WorkerSpawned { role, feature_id, pid } => {
            println!("[{role}] spawned feature {feature_id} (pid {pid})")
        }
        Event::WorkerCompleted { role, feature_id, outcome, .. } => {
            println!("[{role}] feature {feature_id} finished: {outcome}")
        }
        Event::WorkerOutputLine { role, feature_id, line } => {
            println!("[{role}:{feature_id}] {line}")
        }
        Event::FeatureStateChanged { feature_id, old_state, new_state } => {
            println!("feature {feature_id}: {old_state} -> {new_state}")
        }
        Event::ProgressSummary { total, passing, running, quarantined } => {
            println!("progress: {passing}/{total} passing, {running} running, {quarantined} quarantined")
        }
    }
}

/// Renders a one-shot snapshot for `pao status`.
pub fn print_snapshot(snapshot: &Snapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let features: Vec<_> = snapshot.iter().collect();
            if let Ok(text) = serde_json::to_string_pretty(&features) {
                println!("{text}");
            }
        }
        OutputFormat::Text => {
            if snapshot.is_empty() {
                println!("store is empty");
                return;
            }
            for feature in snapshot.iter() {
                let state = FeatureState::of(feature);
                println!(
                    "#{:<4} {:<9} {} (skips: {})",
                    feature.id, state, feature.name, feature.skip_count
                );
            }
            let total = snapshot.len();
            let passing = snapshot.iter().filter(|f| f.passes).count();
            let running = snapshot.iter().filter(|f| f.running).count();
            println!("\n{passing}/{total} passing, {running} running");
        }
    }
}
