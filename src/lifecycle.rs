//! Database lifecycle controller
//!
//! Owns the live engine handle and the transient migration status, and runs
//! the startup sequence: load the persisted buffer or create a fresh
//! database, create the base schema, then run migrations. Collaborators never
//! touch an engine that is not `Ready`.

use std::sync::Arc;

use serde::Serialize;

use crate::backup::BackupManager;
use crate::engine::Engine;
use crate::migrate::{self, MigrationStatus};
use crate::schema;
use crate::store::DATABASE_KEY;
use crate::{ByteStore, Error, Result};

/// Startup state machine. `Failed` is terminal until the host restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Exclusive owner of the engine handle and migration status
pub struct Lifecycle {
    state: LifecycleState,
    engine: Option<Engine>,
    status: MigrationStatus,
    init_error: Option<String>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            engine: None,
            status: MigrationStatus::default(),
            init_error: None,
        }
    }

    /// Run the startup sequence against a byte store.
    ///
    /// On success the lifecycle is `Ready`. A failing migration still leaves
    /// the system `Ready` on the last applied schema version, with the
    /// failure recorded in the migration status; only load/create and base
    /// schema errors land in `Failed`.
    pub async fn init(&mut self, store: &Arc<dyn ByteStore>) -> Result<()> {
        self.state = LifecycleState::Loading;
        self.status = MigrationStatus::default();
        self.init_error = None;

        let migrations = match migrate::shipped_migrations() {
            Ok(set) => set,
            Err(e) => return Err(self.fail(e)),
        };

        let engine = match self.load_or_create(store).await {
            Ok(engine) => engine,
            Err(e) => return Err(self.fail(e)),
        };

        for stmt in schema::base_schema_statements() {
            if let Err(e) = engine.conn().execute(stmt, []) {
                return Err(self.fail(e.into()));
            }
        }

        let backups = BackupManager::new(store.clone());
        let mut status = MigrationStatus::default();
        let outcome = migrate::run(&engine, &backups, &migrations, &mut status).await;

        match outcome {
            Ok(true) => {
                // Recorded versions must survive a restart
                match engine.export() {
                    Ok(bytes) => {
                        if let Err(e) = store.set(DATABASE_KEY, &bytes).await {
                            tracing::warn!("Failed to persist migrated database: {}", e);
                        }
                    }
                    Err(e) => tracing::warn!("Failed to export migrated database: {}", e),
                }
            }
            Ok(false) => {}
            Err(e) => {
                // Base tables exist, so the archive stays usable on the last
                // applied version; the failure is surfaced via status
                tracing::error!("Migration run failed: {}", e);
            }
        }

        self.status = status;
        self.engine = Some(engine);
        self.state = LifecycleState::Ready;
        tracing::info!("Database initialized");
        Ok(())
    }

    async fn load_or_create(&self, store: &Arc<dyn ByteStore>) -> Result<Engine> {
        match store.get(DATABASE_KEY).await? {
            Some(bytes) => {
                let engine = Engine::open(&bytes)?;
                tracing::info!(size = bytes.len(), "Loaded existing database");
                Ok(engine)
            }
            None => {
                let engine = Engine::create()?;
                tracing::info!("Created new database");
                Ok(engine)
            }
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        let message = error.to_string();
        tracing::error!("Database initialization failed: {}", message);
        self.engine = None;
        self.state = LifecycleState::Failed;
        self.init_error = Some(message);
        error
    }

    /// Mark the lifecycle terminally unavailable (lost engine, no restorable
    /// buffer)
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("Database became unavailable: {}", message);
        self.engine = None;
        self.state = LifecycleState::Failed;
        self.init_error = Some(message);
    }

    /// Swap in a replacement engine (import/restore paths)
    pub fn install_engine(&mut self, engine: Engine) {
        self.engine = Some(engine);
        self.state = LifecycleState::Ready;
        self.init_error = None;
    }

    /// The live engine; fails closed unless `Ready`
    pub fn engine(&self) -> Result<&Engine> {
        match (&self.engine, self.state) {
            (Some(engine), LifecycleState::Ready) => Ok(engine),
            _ => Err(Error::Unavailable(
                self.init_error
                    .clone()
                    .unwrap_or_else(|| "database is not initialized".to_string()),
            )),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LifecycleState::Ready
    }

    pub fn migration_status(&self) -> &MigrationStatus {
        &self.status
    }

    pub fn set_migration_status(&mut self, status: MigrationStatus) {
        self.status = status;
    }

    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }
}
