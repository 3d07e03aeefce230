//! Embedded SQL engine wrapper
//!
//! The engine is an in-memory SQLite connection. Durable state is a byte
//! buffer: [`Engine::open`] loads one, [`Engine::export`] produces one. Both
//! go through SQLite's online backup API with a scratch file, which yields a
//! consistent snapshot regardless of connection state.

use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::Connection;

use crate::{Error, Result};

/// Magic bytes at the start of every SQLite 3 database file
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Pages copied per backup step
const BACKUP_PAGES_PER_STEP: std::os::raw::c_int = 64;

/// In-memory SQLite database handle
#[derive(Debug)]
pub struct Engine {
    conn: Connection,
}

impl Engine {
    /// Create a fresh, empty in-memory database
    pub fn create() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open an in-memory database from an exported byte buffer
    pub fn open(bytes: &[u8]) -> Result<Self> {
        validate_magic(bytes)?;

        let scratch = tempfile::NamedTempFile::new()?;
        std::fs::write(scratch.path(), bytes)?;

        let src = Connection::open(scratch.path())
            .map_err(|e| Error::InvalidDatabase(e.to_string()))?;
        let mut conn = Connection::open_in_memory()?;
        copy_database(&src, &mut conn).map_err(|e| Error::InvalidDatabase(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Export the full database as a byte buffer
    pub fn export(&self) -> Result<Vec<u8>> {
        let scratch = tempfile::NamedTempFile::new()?;
        {
            let mut dst = Connection::open(scratch.path())?;
            copy_database(&self.conn, &mut dst)?;
        }
        Ok(std::fs::read(scratch.path())?)
    }

    /// Access the live connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn copy_database(src: &Connection, dst: &mut Connection) -> rusqlite::Result<()> {
    let backup = Backup::new(src, dst)?;
    backup.run_to_completion(BACKUP_PAGES_PER_STEP, Duration::from_millis(0), None)
}

/// Check that a buffer carries the SQLite file header
pub fn validate_magic(bytes: &[u8]) -> Result<()> {
    if bytes.len() < SQLITE_MAGIC.len() {
        return Err(Error::InvalidDatabase(
            "buffer too small to be a SQLite database".to_string(),
        ));
    }
    if &bytes[..SQLITE_MAGIC.len()] != SQLITE_MAGIC {
        return Err(Error::InvalidDatabase("invalid SQLite file format".to_string()));
    }
    Ok(())
}

/// Check whether a table exists
pub fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// List the column names of a table
pub fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    // Table names cannot be bound as parameters in PRAGMA statements
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Validate that a byte buffer is a SQLite database holding an archive:
/// a `queries` table with at least `id` and `query_text` columns.
pub fn validate_archive_bytes(bytes: &[u8]) -> Result<()> {
    let engine = Engine::open(bytes)?;

    if !has_table(engine.conn(), "queries")? {
        return Err(Error::InvalidDatabase(
            "database does not contain the expected queries table".to_string(),
        ));
    }

    let columns = column_names(engine.conn(), "queries")?;
    for required in ["id", "query_text"] {
        if !columns.iter().any(|c| c == required) {
            return Err(Error::InvalidDatabase(format!(
                "queries table is missing required column '{}'",
                required
            )));
        }
    }

    Ok(())
}
