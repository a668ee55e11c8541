// SPDX-License-Identifier: MIT

//! SQLite-backed [`Store`] implementation.
//!
//! A single `rusqlite::Connection` to one on-disk file, guarded by a
//! `parking_lot::Mutex` so the handle is safe to share across the
//! tokio tasks inside this process; work is dispatched through
//! `spawn_blocking` since `rusqlite` is synchronous. Cross-*process*
//! safety comes from SQLite's own file locking, not from this mutex —
//! `conditional_claim` is a single `UPDATE ... WHERE ...` statement so
//! two orchestrator processes racing for the same row genuinely
//! serialize at the SQLite layer.

use crate::store::{FinalState, Store};
use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pao_core::{Clock, DependencyError, Feature, FeatureId, NewFeature, Snapshot, SystemClock};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct SqliteStore<C: Clock = SystemClock> {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
    clock: C,
}

fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    crate::schema::apply(&conn)?;
    Ok(conn)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

fn read_snapshot(conn: &Connection) -> Result<Snapshot, StoreError> {
    let mut dep_stmt = conn.prepare("SELECT from_id, to_id FROM dependencies")?;
    let mut deps_by_from: HashMap<i64, BTreeSet<FeatureId>> = HashMap::new();
    let dep_rows = dep_stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;
    for dep_row in dep_rows {
        let (from_id, to_id) = dep_row?;
        deps_by_from.entry(from_id).or_default().insert(FeatureId::new(to_id));
    }

    let mut stmt = conn.prepare(
        "SELECT id, priority, name, category, description, steps_json, passes, running, \
         skip_count, created_at, updated_at FROM features",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, i64>(6)? != 0,
            row.get::<_, i64>(7)? != 0,
            row.get::<_, i64>(8)? as u32,
            row.get::<_, String>(9)?,
            row.get::<_, String>(10)?,
        ))
    })?;

    let mut features = Vec::new();
    for row in rows {
        let (id, priority, name, category, description, steps_json, passes, running, skip_count, created_at, updated_at) =
            row?;
        let steps: Vec<String> = serde_json::from_str(&steps_json)?;
        features.push(Feature {
            id: FeatureId::new(id),
            priority,
            name,
            category,
            description,
            steps,
            passes,
            running,
            skip_count,
            dependencies: deps_by_from.remove(&id).unwrap_or_default(),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        });
    }
    Ok(Snapshot::new(features))
}

fn feature_exists(conn: &Connection, id: FeatureId) -> Result<bool, StoreError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM features WHERE id = ?1)",
        params![id.get()],
        |row| row.get(0),
    )
    .map_err(StoreError::from)
}

impl SqliteStore<SystemClock> {
    /// Open (creating if absent) a store backed by `path`, stamping rows
    /// with the real system clock.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_clock(path, SystemClock).await
    }
}

impl<C: Clock> SqliteStore<C> {
    /// Open (creating if absent) a store backed by `path`, stamping rows
    /// with `clock`, so tests can drive `created_at`/`updated_at` with a
    /// [`pao_core::FakeClock`] instead of real time.
    pub async fn open_with_clock(path: impl AsRef<Path>, clock: C) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tracing::info!(path = %path.display(), "opening store");
        let open_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&open_path))
            .await
            .map_err(|e| StoreError::TaskJoin(e.to_string()))??;
        Ok(Self { path, conn: Arc::new(Mutex::new(conn)), clock })
    }

    fn now_rfc3339(&self) -> String {
        self.clock.now_utc().to_rfc3339()
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }
}

#[async_trait]
impl<C: Clock> Store for SqliteStore<C> {
    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        self.with_conn(|conn| read_snapshot(conn)).await
    }

    async fn insert_bulk(&self, features: Vec<NewFeature>) -> Result<Vec<FeatureId>, StoreError> {
        let now = self.now_rfc3339();
        self.with_conn(move |conn| {
            let existing: i64 = conn.query_row("SELECT COUNT(*) FROM features", [], |r| r.get(0))?;
            if existing != 0 {
                return Err(StoreError::NotEmpty);
            }
            let tx = conn.unchecked_transaction()?;
            let mut ids = Vec::with_capacity(features.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO features \
                     (priority, name, category, description, steps_json, passes, running, skip_count, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, ?6, ?6)",
                )?;
                for feature in &features {
                    let steps_json = serde_json::to_string(&feature.steps)?;
                    stmt.execute(params![
                        feature.priority,
                        feature.name,
                        feature.category,
                        feature.description,
                        steps_json,
                        now,
                    ])?;
                    ids.push(FeatureId::new(tx.last_insert_rowid()));
                }
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
    }

    async fn add_dependency(&self, from: FeatureId, to: FeatureId) -> Result<(), StoreError> {
        let now = self.now_rfc3339();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            if !feature_exists(&tx, from)? {
                return Err(DependencyError::NotFound(from).into());
            }
            if !feature_exists(&tx, to)? {
                return Err(DependencyError::NotFound(to).into());
            }
            let snapshot = read_snapshot(&tx)?;
            if pao_core::resolver::would_create_cycle(&snapshot, from, to) {
                return Err(DependencyError::Cycle { from, to }.into());
            }
            tx.execute(
                "INSERT OR IGNORE INTO dependencies (from_id, to_id) VALUES (?1, ?2)",
                params![from.get(), to.get()],
            )?;
            tx.execute(
                "UPDATE features SET updated_at = ?1 WHERE id = ?2",
                params![now, from.get()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn remove_dependency(&self, from: FeatureId, to: FeatureId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM dependencies WHERE from_id = ?1 AND to_id = ?2",
                params![from.get(), to.get()],
            )?;
            Ok(())
        })
        .await
    }

    async fn conditional_claim(&self, id: FeatureId) -> Result<bool, StoreError> {
        let now = self.now_rfc3339();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE features SET running = 1, updated_at = ?1 \
                 WHERE id = ?2 AND running = 0 AND passes = 0",
                params![now, id.get()],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn release(&self, id: FeatureId, final_state: FinalState) -> Result<(), StoreError> {
        let now = self.now_rfc3339();
        self.with_conn(move |conn| {
            match final_state {
                FinalState::Success => conn.execute(
                    "UPDATE features SET running = 0, passes = 1, updated_at = ?1 WHERE id = ?2",
                    params![now, id.get()],
                )?,
                FinalState::Pending => conn.execute(
                    "UPDATE features SET running = 0, updated_at = ?1 WHERE id = ?2",
                    params![now, id.get()],
                )?,
            };
            Ok(())
        })
        .await
    }

    async fn refresh(&self) -> Result<(), StoreError> {
        let path = self.path.clone();
        let conn_arc = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let fresh = open_connection(&path)?;
            *conn_arc.lock() = fresh;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))??;
        tracing::debug!("connection refreshed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
