// SPDX-License-Identifier: MIT

//! `pao status`: read-only inspection of a project's store, no workers spawned.

use crate::output::{print_snapshot, OutputFormat};
use clap::Args;
use pao_storage::{SqliteStore, Store};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct StatusArgs {
    /// Project directory whose store to inspect.
    project_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

pub async fn run(args: StatusArgs) -> ExitCode {
    let db_path = args.project_dir.join("pao.sqlite3");
    let store = match SqliteStore::open(&db_path).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to open store at {}: {e}", db_path.display());
            return ExitCode::FAILURE;
        }
    };

    let snapshot = match store.snapshot().await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to read store: {e}");
            return ExitCode::FAILURE;
        }
    };

    print_snapshot(&snapshot, args.format);
    ExitCode::SUCCESS
}
