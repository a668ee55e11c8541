// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pao-storage: the Store contract and its SQLite-backed
//! implementation.
//!
//! The committed graph is the single source of truth for every other
//! component. `conditional_claim` is the only primitive that may
//! transition a feature `pending -> running`, and it is implemented as a
//! single `UPDATE ... WHERE ...` statement so that it stays atomic across
//! **separate OS processes** sharing one SQLite file — not merely
//! across tasks within one process.

pub mod error;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use sqlite::SqliteStore;
pub use store::{FinalState, Store};
