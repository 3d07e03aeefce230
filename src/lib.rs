//! # Querystash - Embedded Query Archive
//!
//! A lifecycle manager for an embedded SQLite database that lives entirely in
//! memory and is persisted as a byte buffer in an asynchronous key-value byte
//! store.
//!
//! Querystash provides:
//! - Load-or-create startup sequencing with a Ready/Failed state machine
//! - Versioned forward schema migrations, recorded exactly once
//! - Rolling byte-buffer backups taken before risky operations
//! - A query-archive API: save, search, paginate, annotate, export, import
//! - A typed command surface that never leaks errors across the boundary

pub mod archive;
pub mod backup;
pub mod command;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod migrate;
pub mod record;
pub mod schema;
pub mod store;
pub mod summarize;

// Re-exports for convenient access
pub use archive::QueryArchive;
pub use engine::Engine;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use migrate::{Migration, MigrationSet, MigrationStatus};
pub use record::{CapturedQuery, QueryRecord, ResponsePreview};
pub use store::{ByteStore, FileByteStore, MemoryByteStore};

/// Result type alias for querystash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for querystash operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Engine error: {0}")]
    Engine(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Byte store error: {0}")]
    Store(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Migration {version} failed: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("Duplicate migration version: {0}")]
    DuplicateMigration(u32),

    #[error("Invalid database: {0}")]
    InvalidDatabase(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
