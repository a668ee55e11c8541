// SPDX-License-Identifier: MIT

//! `pao init`: bulk-seed an empty store from a JSON feature list, as a
//! convenience alternative to writing a custom initializer worker.

use clap::Args;
use pao_core::NewFeature;
use pao_storage::{SqliteStore, Store};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct InitArgs {
    /// Project directory to seed.
    project_dir: PathBuf,

    /// JSON file describing the feature list.
    #[arg(long = "from")]
    from: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SeedFeature {
    name: String,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    steps: Vec<String>,
    #[serde(default)]
    depends_on: Vec<String>,
}

pub async fn run(args: InitArgs) -> ExitCode {
    let raw = match std::fs::read_to_string(&args.from) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("failed to read {}: {e}", args.from.display());
            return ExitCode::FAILURE;
        }
    };
    let seeds: Vec<SeedFeature> = match serde_json::from_str(&raw) {
        Ok(seeds) => seeds,
        Err(e) => {
            eprintln!("failed to parse {}: {e}", args.from.display());
            return ExitCode::FAILURE;
        }
    };

    let db_path = args.project_dir.join("pao.sqlite3");
    let store = match SqliteStore::open(&db_path).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to open store at {}: {e}", db_path.display());
            return ExitCode::FAILURE;
        }
    };

    let new_features: Vec<NewFeature> = seeds
        .iter()
        .map(|seed| NewFeature {
            priority: seed.priority,
            name: seed.name.clone(),
            category: seed.category.clone(),
            description: seed.description.clone(),
            steps: seed.steps.clone(),
        })
        .collect();

    let ids = match store.insert_bulk(new_features).await {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("failed to seed store: {e}");
            return ExitCode::FAILURE;
        }
    };

    let id_by_name: HashMap<&str, _> =
        seeds.iter().map(|s| s.name.as_str()).zip(ids.iter().copied()).collect();

    for (seed, &id) in seeds.iter().zip(ids.iter()) {
        for dep_name in &seed.depends_on {
            let Some(&dep_id) = id_by_name.get(dep_name.as_str()) else {
                eprintln!("feature {} depends on unknown feature {dep_name}", seed.name);
                return ExitCode::FAILURE;
            };
            if let Err(e) = store.add_dependency(id, dep_id).await {
                eprintln!("failed to add dependency {} -> {}: {e}", seed.name, dep_name);
                return ExitCode::FAILURE;
            }
        }
    }

    println!("seeded {} feature(s)", ids.len());
    ExitCode::SUCCESS
}
