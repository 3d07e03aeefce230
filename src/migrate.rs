//! Schema migration engine
//!
//! Migrations are versioned forward transforms applied exactly once each, in
//! ascending version order, with the applied version recorded in the
//! `schema_version` table. A run snapshots the database first (awaited, with
//! a bounded timeout) and halts the queue on the first failure.
//!
//! Transforms must be defensive: a transform can be re-invoked on re-entrant
//! startup paths, so column and table additions check for existence first.
//! The engine guarantees exactly-once recording, not exactly-once execution.

use std::collections::BTreeMap;
use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;

use crate::backup::BackupManager;
use crate::engine::{self, Engine};
use crate::schema;
use crate::{Error, Result};

/// How long a pre-migration backup may take before the run proceeds without it
pub const BACKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Forward transform run against the live connection
pub type MigrationFn = fn(&Connection) -> Result<()>;

/// A versioned, one-way schema/data transformation
#[derive(Clone)]
pub struct Migration {
    /// Unique version; defines the total order
    pub version: u32,
    pub description: &'static str,
    pub up: MigrationFn,
}

/// Ordered migration registry keyed by version.
///
/// Version collisions are rejected at insertion, so a duplicate shipped
/// version is a startup-time hard failure instead of silent ambiguity.
#[derive(Default)]
pub struct MigrationSet {
    by_version: BTreeMap<u32, Migration>,
}

impl MigrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, migration: Migration) -> Result<()> {
        let version = migration.version;
        if self.by_version.insert(version, migration).is_some() {
            return Err(Error::DuplicateMigration(version));
        }
        Ok(())
    }

    /// Migrations with a version strictly greater than `current`, ascending
    pub fn pending(&self, current: u32) -> Vec<&Migration> {
        self.by_version
            .values()
            .filter(|m| m.version > current)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_version.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_version.is_empty()
    }
}

/// Outcome of the most recent migration run; transient, never persisted
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatus {
    pub has_unapplied_migrations: bool,
    pub failed_migration: Option<FailedMigration>,
    pub last_backup_date: Option<String>,
}

/// The migration that halted the queue
#[derive(Debug, Clone, Serialize)]
pub struct FailedMigration {
    pub version: u32,
    pub error: String,
}

/// The migrations shipped with this release
pub fn shipped_migrations() -> Result<MigrationSet> {
    let mut set = MigrationSet::new();
    set.insert(Migration {
        version: 1,
        description: "Add runs_count, last_used_at, and description columns",
        up: add_usage_columns,
    })?;
    Ok(set)
}

fn add_usage_columns(conn: &Connection) -> Result<()> {
    let columns = engine::column_names(conn, "queries")?;
    let has = |name: &str| columns.iter().any(|c| c == name);

    if !has("runs_count") {
        conn.execute("ALTER TABLE queries ADD COLUMN runs_count INTEGER DEFAULT 1", [])?;
        conn.execute("UPDATE queries SET runs_count = 1 WHERE runs_count IS NULL", [])?;
    }

    if !has("last_used_at") {
        conn.execute("ALTER TABLE queries ADD COLUMN last_used_at TEXT", [])?;
        conn.execute(
            "UPDATE queries
             SET last_used_at = COALESCE(created_at, timestamp, datetime('now'))
             WHERE last_used_at IS NULL",
            [],
        )?;
    }

    if !has("description") {
        conn.execute("ALTER TABLE queries ADD COLUMN description TEXT DEFAULT 'Untitled'", [])?;
        conn.execute("UPDATE queries SET description = 'Untitled' WHERE description IS NULL", [])?;
    }

    Ok(())
}

/// Read the current schema version: the maximum recorded version, or 0 when
/// the tracking table is missing or empty. Never errors for those cases.
pub fn current_version(conn: &Connection) -> u32 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<u32>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}

fn record_version(conn: &Connection, version: u32, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        rusqlite::params![version, chrono::Utc::now().to_rfc3339(), description],
    )?;
    Ok(())
}

/// Apply all pending migrations, in ascending version order.
///
/// Returns `Ok(true)` when at least one migration was applied, `Ok(false)`
/// for a no-op run. A failing migration aborts the rest of the queue, records
/// the failure in `status`, and returns the error; earlier migrations stay
/// applied and recorded.
pub async fn run(
    engine: &Engine,
    backups: &BackupManager,
    set: &MigrationSet,
    status: &mut MigrationStatus,
) -> Result<bool> {
    let conn = engine.conn();
    conn.execute(schema::CREATE_SCHEMA_VERSION_TABLE, [])?;

    let current = current_version(conn);
    tracing::debug!(version = current, "Current schema version");

    let pending = set.pending(current);
    if pending.is_empty() {
        tracing::debug!("No pending migrations");
        status.has_unapplied_migrations = false;
        status.failed_migration = None;
        return Ok(false);
    }

    tracing::info!("Running {} pending migration(s)", pending.len());

    // Snapshot before mutating. The run proceeds without a safety net when
    // the backup fails or times out, but never races it.
    match tokio::time::timeout(BACKUP_TIMEOUT, backups.create(engine)).await {
        Ok(Ok(info)) => status.last_backup_date = Some(info.date),
        Ok(Err(e)) => {
            tracing::warn!("Pre-migration backup failed, proceeding without it: {}", e);
        }
        Err(_) => {
            tracing::warn!("Pre-migration backup timed out, proceeding without it");
        }
    }

    for migration in pending {
        tracing::info!(
            version = migration.version,
            "Applying migration: {}",
            migration.description
        );

        let applied = (migration.up)(conn)
            .and_then(|_| record_version(conn, migration.version, migration.description));

        if let Err(e) = applied {
            let message = e.to_string();
            tracing::error!(version = migration.version, "Migration failed: {}", message);
            status.has_unapplied_migrations = true;
            status.failed_migration = Some(FailedMigration {
                version: migration.version,
                error: message.clone(),
            });
            return Err(Error::MigrationFailed {
                version: migration.version,
                message,
            });
        }
    }

    status.has_unapplied_migrations = false;
    status.failed_migration = None;
    tracing::info!("All migrations completed");
    Ok(true)
}
