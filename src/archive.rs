//! Query archive store
//!
//! The domain read/write API over the engine, lifecycle, backup, and byte
//! store machinery. Every mutating operation re-serializes the engine buffer
//! to the byte store before returning, so state survives host restarts.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};

use crate::backup::BackupManager;
use crate::engine::{self, Engine};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::migrate::{self, MigrationStatus};
use crate::record::{CapturedQuery, QueryRecord, DEFAULT_DESCRIPTION};
use crate::schema;
use crate::store::DATABASE_KEY;
use crate::summarize::{clean_query_text, description_or_default, Summarizer};
use crate::{ByteStore, Error, Result};

/// Column list matching [`row_to_record`]
const RECORD_COLUMNS: &str = "id, query_text, database_name, cluster_name, url, timestamp, \
     created_at, last_used_at, runs_count, description, request_body, response_preview";

/// Archive of captured queries persisted through a byte store
pub struct QueryArchive {
    store: Arc<dyn ByteStore>,
    summarizer: Arc<dyn Summarizer>,
    backups: BackupManager,
    lifecycle: Lifecycle,
}

impl QueryArchive {
    pub fn new(store: Arc<dyn ByteStore>, summarizer: Arc<dyn Summarizer>) -> Self {
        let backups = BackupManager::new(store.clone());
        Self {
            store,
            summarizer,
            backups,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Run the startup sequence; usable operations require this to have
    /// completed
    pub async fn init(&mut self) -> Result<()> {
        self.lifecycle.init(&self.store).await
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn migration_status(&self) -> &MigrationStatus {
        self.lifecycle.migration_status()
    }

    pub fn init_error(&self) -> Option<&str> {
        self.lifecycle.init_error()
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn summarizer(&self) -> &dyn Summarizer {
        self.summarizer.as_ref()
    }

    /// Re-serialize the live buffer to the byte store
    async fn persist(&self) -> Result<()> {
        let bytes = self.lifecycle.engine()?.export()?;
        self.store.set(DATABASE_KEY, &bytes).await
    }

    /// Archive one capture.
    ///
    /// Control queries, empty queries, and captures without confirmed results
    /// are skipped silently (`Ok(false)`). A re-observation of an existing
    /// (query, database, cluster) triple updates that row instead of
    /// inserting; an insert that loses a race to the unique constraint falls
    /// back to the update path. Returns once the buffer is durable.
    pub async fn save(&self, capture: &CapturedQuery) -> Result<bool> {
        self.lifecycle.engine()?;

        if capture.should_skip() {
            tracing::debug!("Capture skipped by archive filters");
            return Ok(false);
        }

        match self.find_existing(capture)? {
            Some(id) => {
                self.touch_existing(id, capture)?;
                tracing::debug!(id, "Existing query re-observed");
            }
            None => {
                let summary = self
                    .summarizer
                    .describe(&clean_query_text(&capture.query))
                    .await;
                let description = description_or_default(summary);

                match self.insert_new(capture, &description) {
                    Ok(id) => tracing::debug!(id, "New query archived"),
                    // Two saves of the same triple can be in flight at once;
                    // the unique constraint is the source of truth
                    Err(Error::Engine(e)) if is_unique_violation(&e) => {
                        match self.find_existing(capture)? {
                            Some(id) => self.touch_existing(id, capture)?,
                            None => return Err(Error::Engine(e)),
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.persist().await?;
        Ok(true)
    }

    fn find_existing(&self, capture: &CapturedQuery) -> Result<Option<i64>> {
        let engine = self.lifecycle.engine()?;
        // IS gives null-safe matching for absent database/cluster names
        let id = engine
            .conn()
            .query_row(
                "SELECT id FROM queries
                 WHERE query_text = ?1 AND database_name IS ?2 AND cluster_name IS ?3",
                params![capture.query, capture.database, capture.cluster],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn touch_existing(&self, id: i64, capture: &CapturedQuery) -> Result<()> {
        let engine = self.lifecycle.engine()?;
        engine.conn().execute(
            "UPDATE queries
             SET runs_count = runs_count + 1,
                 last_used_at = ?1,
                 url = ?2,
                 request_body = ?3,
                 response_preview = ?4
             WHERE id = ?5",
            params![
                capture.timestamp,
                capture.url,
                to_json_column(&capture.request_body)?,
                preview_json(capture)?,
                id
            ],
        )?;
        Ok(())
    }

    fn insert_new(&self, capture: &CapturedQuery, description: &str) -> Result<i64> {
        let engine = self.lifecycle.engine()?;
        engine.conn().execute(
            "INSERT INTO queries (
                 query_text, database_name, cluster_name, url, timestamp,
                 last_used_at, request_body, response_preview, description
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                capture.query,
                capture.database,
                capture.cluster,
                capture.url,
                capture.timestamp,
                capture.timestamp,
                to_json_column(&capture.request_body)?,
                preview_json(capture)?,
                description
            ],
        )?;
        Ok(engine.conn().last_insert_rowid())
    }

    /// Total archived rows
    pub fn count(&self) -> Result<i64> {
        let engine = self.lifecycle.engine()?;
        let count =
            engine
                .conn()
                .query_row("SELECT COUNT(*) FROM queries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Most recently used queries, offset-paginated
    pub fn recent(&self, limit: usize, offset: usize) -> Result<Vec<QueryRecord>> {
        let engine = self.lifecycle.engine()?;
        let mut stmt = engine.conn().prepare(&format!(
            "SELECT {} FROM queries ORDER BY last_used_at DESC LIMIT ?1 OFFSET ?2",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![limit as i64, offset as i64], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Case-insensitive substring search across query text, database,
    /// cluster, and URL. A blank term falls back to [`Self::recent`].
    pub fn search(&self, term: &str, limit: usize) -> Result<Vec<QueryRecord>> {
        if term.trim().is_empty() {
            return self.recent(limit, 0);
        }

        let engine = self.lifecycle.engine()?;
        let pattern = format!("%{}%", term);
        let mut stmt = engine.conn().prepare(&format!(
            "SELECT {} FROM queries
             WHERE query_text LIKE ?1
                OR database_name LIKE ?1
                OR cluster_name LIKE ?1
                OR url LIKE ?1
             ORDER BY created_at DESC
             LIMIT ?2",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![pattern, limit as i64], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Delete one row by id. Returns `Ok(false)` when the row does not exist
    /// or survived the delete; the buffer is persisted only on success.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let engine = self.lifecycle.engine()?;

        let exists: Option<i64> = engine
            .conn()
            .query_row("SELECT id FROM queries WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            tracing::warn!(id, "Delete requested for missing query");
            return Ok(false);
        }

        engine.conn().execute("DELETE FROM queries WHERE id = ?1", [id])?;

        let survivors: i64 = engine.conn().query_row(
            "SELECT COUNT(*) FROM queries WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        if survivors > 0 {
            tracing::error!(id, "Query survived deletion");
            return Ok(false);
        }

        self.persist().await?;
        tracing::debug!(id, "Query deleted");
        Ok(true)
    }

    /// Replace the description of one row and persist the buffer
    pub async fn update_description(&self, id: i64, description: &str) -> Result<bool> {
        let engine = self.lifecycle.engine()?;
        engine.conn().execute(
            "UPDATE queries SET description = ?1 WHERE id = ?2",
            params![description, id],
        )?;
        self.persist().await?;
        Ok(true)
    }

    /// The live buffer, without mutating state
    pub fn export(&self) -> Result<Vec<u8>> {
        self.lifecycle.engine()?.export()
    }

    /// Replace the archive with an imported buffer.
    ///
    /// The buffer is validated before anything is mutated; then the current
    /// database is backed up, the engine swapped, migrations re-run (an older
    /// exported schema is brought current), and the result persisted. Any
    /// failure after the swap rolls back to the previously persisted buffer;
    /// if that rollback fails too, the archive reports unavailable.
    pub async fn import(&mut self, bytes: &[u8]) -> Result<()> {
        engine::validate_archive_bytes(bytes)?;

        match self.lifecycle.engine() {
            Ok(current) => {
                if let Err(e) = self.backups.create(current).await {
                    tracing::warn!("Failed to back up before import, proceeding: {}", e);
                }
            }
            Err(e) => tracing::warn!("No live database to back up before import: {}", e),
        }

        if let Err(e) = self.apply_import(bytes).await {
            tracing::error!("Import failed, attempting rollback: {}", e);
            self.restore_persisted().await;
            return Err(e);
        }

        tracing::info!("Database import completed");
        Ok(())
    }

    async fn apply_import(&mut self, bytes: &[u8]) -> Result<()> {
        // Dropping the previous engine closes its handle
        self.lifecycle.install_engine(Engine::open(bytes)?);

        let migrations = migrate::shipped_migrations()?;
        let mut status = MigrationStatus::default();
        let outcome = {
            let engine = self.lifecycle.engine()?;
            for stmt in schema::base_schema_statements() {
                engine.conn().execute(stmt, [])?;
            }
            migrate::run(engine, &self.backups, &migrations, &mut status).await
        };
        self.lifecycle.set_migration_status(status);
        outcome?;

        self.persist().await
    }

    async fn restore_persisted(&mut self) {
        match self.store.get(DATABASE_KEY).await {
            Ok(Some(bytes)) => match Engine::open(&bytes) {
                Ok(engine) => {
                    self.lifecycle.install_engine(engine);
                    tracing::info!("Database restored from persisted buffer");
                }
                Err(e) => self
                    .lifecycle
                    .mark_failed(format!("restore from persisted buffer failed: {}", e)),
            },
            Ok(None) => self
                .lifecycle
                .mark_failed("no persisted buffer available for restore"),
            Err(e) => self
                .lifecycle
                .mark_failed(format!("persisted buffer unreadable: {}", e)),
        }
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn to_json_column(value: &Option<serde_json::Value>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(Error::from))
        .transpose()
}

fn preview_json(capture: &CapturedQuery) -> Result<Option<String>> {
    capture
        .response_preview
        .as_ref()
        .map(|p| serde_json::to_string(p).map_err(Error::from))
        .transpose()
}

/// Map one engine row to the typed record; the single place column order and
/// defaults are decided
fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<QueryRecord> {
    let request_body: Option<String> = row.get(10)?;
    let response_preview: Option<String> = row.get(11)?;

    Ok(QueryRecord {
        id: row.get(0)?,
        query_text: row.get(1)?,
        database_name: row.get(2)?,
        cluster_name: row.get(3)?,
        url: row.get(4)?,
        timestamp: row.get(5)?,
        created_at: row.get(6)?,
        last_used_at: row.get(7)?,
        runs_count: row.get::<_, Option<i64>>(8)?.unwrap_or(1),
        description: row
            .get::<_, Option<String>>(9)?
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        request_body: request_body.and_then(|s| serde_json::from_str(&s).ok()),
        response_preview: response_preview.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::record::ResponsePreview;
    use crate::store::MemoryByteStore;
    use crate::summarize::NoSummarizer;

    /// Memory store with switchable read and write faults
    struct FaultyByteStore {
        inner: MemoryByteStore,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
    }

    impl FaultyByteStore {
        fn new() -> Self {
            Self {
                inner: MemoryByteStore::new(),
                fail_writes: AtomicBool::new(false),
                fail_reads: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl ByteStore for FaultyByteStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Error::Store("simulated read failure".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Store("simulated write failure".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, keys: &[String]) -> Result<()> {
            self.inner.remove(keys).await
        }

        async fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys().await
        }
    }

    async fn archive() -> QueryArchive {
        let store: Arc<dyn ByteStore> = Arc::new(MemoryByteStore::new());
        archive_on(store).await
    }

    async fn archive_on(store: Arc<dyn ByteStore>) -> QueryArchive {
        let mut archive = QueryArchive::new(store, Arc::new(NoSummarizer));
        archive.init().await.unwrap();
        archive
    }

    fn capture(query: &str, db: &str, cluster: &str, stamp: &str) -> CapturedQuery {
        CapturedQuery {
            query: query.to_string(),
            database: Some(db.to_string()),
            cluster: Some(cluster.to_string()),
            url: Some("https://example.test/q".to_string()),
            timestamp: Some(stamp.to_string()),
            request_body: Some(serde_json::json!({"csl": query})),
            response_preview: Some(ResponsePreview { has_results: true, result_count: 7 }),
        }
    }

    #[tokio::test]
    async fn test_save_then_reobserve_updates_single_row() {
        let archive = archive().await;
        let first = capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z");

        assert!(archive.save(&first).await.unwrap());
        assert_eq!(archive.count().unwrap(), 1);

        let again = capture("Events | take 10", "d1", "c1", "2026-08-29T11:00:00Z");
        assert!(archive.save(&again).await.unwrap());
        assert_eq!(archive.count().unwrap(), 1);

        let rows = archive.recent(10, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].runs_count, 2);
        assert_eq!(rows[0].last_used_at.as_deref(), Some("2026-08-29T11:00:00Z"));
        assert_eq!(rows[0].description, "Untitled");
    }

    #[tokio::test]
    async fn test_filters_are_silent_skips() {
        let archive = archive().await;

        let control = capture(".show tables", "d1", "c1", "2026-08-29T10:00:00Z");
        assert!(!archive.save(&control).await.unwrap());

        let empty = capture("", "d1", "c1", "2026-08-29T10:00:00Z");
        assert!(!archive.save(&empty).await.unwrap());

        let mut no_results = capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z");
        no_results.response_preview = Some(ResponsePreview { has_results: false, result_count: 0 });
        assert!(!archive.save(&no_results).await.unwrap());

        assert_eq!(archive.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_distinct_triples_are_distinct_rows() {
        let archive = archive().await;
        archive
            .save(&capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();
        archive
            .save(&capture("Events | take 10", "d2", "c1", "2026-08-29T10:01:00Z"))
            .await
            .unwrap();
        archive
            .save(&capture("Events | count", "d1", "c1", "2026-08-29T10:02:00Z"))
            .await
            .unwrap();
        assert_eq!(archive.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_recent_orders_by_last_used_and_paginates() {
        let archive = archive().await;
        for (i, stamp) in ["2026-08-29T10:00:00Z", "2026-08-29T12:00:00Z", "2026-08-29T11:00:00Z"]
            .iter()
            .enumerate()
        {
            archive
                .save(&capture(&format!("Q{}", i), "d1", "c1", stamp))
                .await
                .unwrap();
        }

        let rows = archive.recent(10, 0).unwrap();
        let texts: Vec<&str> = rows.iter().map(|r| r.query_text.as_str()).collect();
        assert_eq!(texts, vec!["Q1", "Q2", "Q0"]);

        let page = archive.recent(2, 1).unwrap();
        let texts: Vec<&str> = page.iter().map(|r| r.query_text.as_str()).collect();
        assert_eq!(texts, vec!["Q2", "Q0"]);
    }

    #[tokio::test]
    async fn test_search_matches_all_origin_fields() {
        let archive = archive().await;
        archive
            .save(&capture("Events | take 10", "metrics", "west", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();
        archive
            .save(&capture("Traces | count", "logs", "east", "2026-08-29T10:01:00Z"))
            .await
            .unwrap();

        assert_eq!(archive.search("events", 50).unwrap().len(), 1);
        assert_eq!(archive.search("logs", 50).unwrap().len(), 1);
        assert_eq!(archive.search("west", 50).unwrap().len(), 1);
        assert_eq!(archive.search("example.test", 50).unwrap().len(), 2);
        assert_eq!(archive.search("nowhere", 50).unwrap().len(), 0);

        // Blank term falls back to recent
        assert_eq!(archive.search("   ", 50).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_semantics() {
        let archive = archive().await;
        archive
            .save(&capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();
        let id = archive.recent(1, 0).unwrap()[0].id;

        assert!(!archive.delete(id + 100).await.unwrap());
        assert_eq!(archive.count().unwrap(), 1);

        assert!(archive.delete(id).await.unwrap());
        assert_eq!(archive.count().unwrap(), 0);
        assert!(archive.recent(10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_description() {
        let archive = archive().await;
        archive
            .save(&capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();
        let id = archive.recent(1, 0).unwrap()[0].id;

        assert!(archive.update_description(id, "Ten events").await.unwrap());
        assert_eq!(archive.recent(1, 0).unwrap()[0].description, "Ten events");
    }

    #[tokio::test]
    async fn test_every_write_is_durable() {
        let store: Arc<dyn ByteStore> = Arc::new(MemoryByteStore::new());
        let archive = archive_on(store.clone()).await;

        archive
            .save(&capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();
        let after_save = store.get(DATABASE_KEY).await.unwrap().unwrap();

        // A restarted instance on the same store sees the row
        let reloaded = archive_on(store.clone()).await;
        assert_eq!(reloaded.count().unwrap(), 1);

        let id = archive.recent(1, 0).unwrap()[0].id;
        archive.update_description(id, "Ten events").await.unwrap();
        let after_update = store.get(DATABASE_KEY).await.unwrap().unwrap();
        assert_ne!(after_save, after_update);

        let reloaded = archive_on(store.clone()).await;
        assert_eq!(reloaded.recent(1, 0).unwrap()[0].description, "Ten events");

        archive.delete(id).await.unwrap();
        let after_delete = store.get(DATABASE_KEY).await.unwrap().unwrap();
        assert_ne!(after_update, after_delete);

        let reloaded = archive_on(store).await;
        assert_eq!(reloaded.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = archive().await;
        source
            .save(&capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();
        source
            .save(&capture("Traces | count", "d2", "c2", "2026-08-29T11:00:00Z"))
            .await
            .unwrap();
        let bytes = source.export().unwrap();

        let mut target = archive().await;
        target.import(&bytes).await.unwrap();

        let expected: Vec<(String, i64)> = source
            .recent(10, 0)
            .unwrap()
            .into_iter()
            .map(|r| (r.query_text, r.runs_count))
            .collect();
        let imported: Vec<(String, i64)> = target
            .recent(10, 0)
            .unwrap()
            .into_iter()
            .map(|r| (r.query_text, r.runs_count))
            .collect();
        assert_eq!(imported, expected);
    }

    #[tokio::test]
    async fn test_import_rejects_invalid_buffer_untouched() {
        let archive_store: Arc<dyn ByteStore> = Arc::new(MemoryByteStore::new());
        let mut archive = archive_on(archive_store).await;
        archive
            .save(&capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();

        let err = archive.import(b"garbage bytes, not a database").await.unwrap_err();
        assert!(matches!(err, Error::InvalidDatabase(_)));

        // Rejected before any mutation
        assert_eq!(archive.state(), LifecycleState::Ready);
        assert_eq!(archive.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_import_rejects_foreign_sqlite_database() {
        let mut archive = archive().await;

        let other = Engine::create().unwrap();
        other
            .conn()
            .execute("CREATE TABLE things (id INTEGER PRIMARY KEY, name TEXT)", [])
            .unwrap();
        let bytes = other.export().unwrap();

        let err = archive.import(&bytes).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDatabase(_)));
        assert_eq!(archive.state(), LifecycleState::Ready);
    }

    #[tokio::test]
    async fn test_failed_import_restores_previous_database() {
        let faulty = Arc::new(FaultyByteStore::new());
        let store: Arc<dyn ByteStore> = faulty.clone();
        let mut archive = archive_on(store).await;
        archive
            .save(&capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();
        let bytes = archive.export().unwrap();

        // The import validates and swaps engines, then fails to persist
        faulty.fail_writes.store(true, Ordering::SeqCst);
        let err = archive.import(&bytes).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));

        // Rolled back to the last persisted buffer, still serving
        assert_eq!(archive.state(), LifecycleState::Ready);
        assert_eq!(archive.count().unwrap(), 1);
        assert_eq!(archive.recent(1, 0).unwrap()[0].query_text, "Events | take 10");
    }

    #[tokio::test]
    async fn test_import_fails_closed_when_restore_impossible() {
        let faulty = Arc::new(FaultyByteStore::new());
        let store: Arc<dyn ByteStore> = faulty.clone();
        let mut archive = archive_on(store).await;
        archive
            .save(&capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();
        let bytes = archive.export().unwrap();

        // Persist fails and the previous buffer cannot be read back either
        faulty.fail_writes.store(true, Ordering::SeqCst);
        faulty.fail_reads.store(true, Ordering::SeqCst);
        assert!(archive.import(&bytes).await.is_err());

        assert_eq!(archive.state(), LifecycleState::Failed);
        assert!(archive.init_error().is_some());
        assert!(matches!(archive.count(), Err(Error::Unavailable(_))));
        let c = capture("Traces | count", "d1", "c1", "2026-08-29T11:00:00Z");
        assert!(matches!(archive.save(&c).await, Err(Error::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_import_takes_backup_of_current_database() {
        let store: Arc<dyn ByteStore> = Arc::new(MemoryByteStore::new());
        let mut archive = archive_on(store.clone()).await;
        archive
            .save(&capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z"))
            .await
            .unwrap();

        let backups_before = archive.backups().list().await.unwrap().len();
        let bytes = archive.export().unwrap();
        archive.import(&bytes).await.unwrap();
        let backups_after = archive.backups().list().await.unwrap().len();
        assert!(backups_after > backups_before);
    }

    #[tokio::test]
    async fn test_operations_fail_closed_before_init() {
        let store: Arc<dyn ByteStore> = Arc::new(MemoryByteStore::new());
        let archive = QueryArchive::new(store, Arc::new(NoSummarizer));

        let c = capture("Events | take 10", "d1", "c1", "2026-08-29T10:00:00Z");
        assert!(matches!(archive.save(&c).await, Err(Error::Unavailable(_))));
        assert!(matches!(archive.count(), Err(Error::Unavailable(_))));
        assert!(matches!(archive.recent(10, 0), Err(Error::Unavailable(_))));
        assert!(matches!(archive.export(), Err(Error::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_capture_to_delete_walkthrough() {
        let archive = archive().await;

        // Save A with results: one row, runs_count 1
        let a = capture("X", "d1", "c1", "2026-08-29T10:00:00Z");
        assert!(archive.save(&a).await.unwrap());
        assert_eq!(archive.count().unwrap(), 1);
        assert_eq!(archive.recent(1, 0).unwrap()[0].runs_count, 1);

        // Save identical A again: still one row, runs_count 2, last_used_at moved
        let a2 = capture("X", "d1", "c1", "2026-08-29T10:05:00Z");
        assert!(archive.save(&a2).await.unwrap());
        assert_eq!(archive.count().unwrap(), 1);
        let row = &archive.recent(1, 0).unwrap()[0];
        assert_eq!(row.runs_count, 2);
        assert_eq!(row.last_used_at.as_deref(), Some("2026-08-29T10:05:00Z"));

        // Empty query text: rejected, nothing added
        let b = capture("", "d1", "c1", "2026-08-29T10:06:00Z");
        assert!(!archive.save(&b).await.unwrap());
        assert_eq!(archive.count().unwrap(), 1);

        // Delete A: nothing remains
        let id = archive.recent(1, 0).unwrap()[0].id;
        assert!(archive.delete(id).await.unwrap());
        assert_eq!(archive.count().unwrap(), 0);

        // Unrecognized magic header: import fails, (empty) data unchanged
        let mut archive = archive;
        assert!(archive.import(b"BOGUS MAGIC HEADER 000000000").await.is_err());
        assert_eq!(archive.count().unwrap(), 0);
        assert_eq!(archive.state(), LifecycleState::Ready);
    }
}
