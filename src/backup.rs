//! Rolling byte-buffer backups
//!
//! Backups bound the blast radius of migrations and imports: both mutate
//! schema and data in an engine with limited reversal support, so a
//! point-in-time buffer snapshot is the only reliable undo. Snapshots live in
//! the byte store under timestamped keys; only the most recent few are kept.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::Engine;
use crate::{ByteStore, Error, Result};

/// Key prefix for backup snapshots
pub const BACKUP_PREFIX: &str = "querystash_backup_";

/// How many snapshots survive pruning
pub const RETAINED_BACKUPS: usize = 3;

/// One stored snapshot
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub key: String,
    pub date: String,
}

/// Creates, lists, exports, and prunes snapshots in the byte store
pub struct BackupManager {
    store: Arc<dyn ByteStore>,
}

impl BackupManager {
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self { store }
    }

    /// Snapshot the live engine into the byte store, then prune old
    /// snapshots. Pruning failures are logged and do not fail the call.
    pub async fn create(&self, engine: &Engine) -> Result<BackupInfo> {
        let bytes = engine.export()?;

        let mut stamp = Utc::now();
        let mut key = backup_key(&stamp);
        // Coarse clocks can hand out the same instant twice; never overwrite
        // an existing snapshot
        while self.store.get(&key).await?.is_some() {
            stamp = stamp + chrono::Duration::nanoseconds(1);
            key = backup_key(&stamp);
        }

        self.store.set(&key, &bytes).await?;
        tracing::info!(key = %key, size = bytes.len(), "Database backup created");

        if let Err(e) = self.prune().await {
            tracing::warn!("Failed to prune old backups: {}", e);
        }

        Ok(BackupInfo {
            date: date_of(&key).to_string(),
            key,
        })
    }

    /// List stored snapshots, most recent first
    pub async fn list(&self) -> Result<Vec<BackupInfo>> {
        let mut backups: Vec<BackupInfo> = self
            .store
            .keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(BACKUP_PREFIX))
            .map(|key| BackupInfo {
                date: date_of(&key).to_string(),
                key,
            })
            .collect();

        backups.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(backups)
    }

    /// Fetch the raw buffer for one snapshot
    pub async fn export(&self, key: &str) -> Result<Vec<u8>> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("backup {}", key)))
    }

    /// Delete everything beyond the most recent [`RETAINED_BACKUPS`] snapshots
    async fn prune(&self) -> Result<()> {
        let backups = self.list().await?;
        if backups.len() <= RETAINED_BACKUPS {
            return Ok(());
        }

        let stale: Vec<String> = backups
            .into_iter()
            .skip(RETAINED_BACKUPS)
            .map(|b| b.key)
            .collect();
        self.store.remove(&stale).await?;
        tracing::debug!("Removed {} old backup(s)", stale.len());
        Ok(())
    }
}

/// Backup keys embed a UTC timestamp in ISO-8601 basic format: colon-free so
/// they work as file names, and lexicographic order matches recency.
fn backup_key(stamp: &DateTime<Utc>) -> String {
    format!("{}{}", BACKUP_PREFIX, stamp.format("%Y%m%dT%H%M%S%.9fZ"))
}

fn date_of(key: &str) -> &str {
    key.strip_prefix(BACKUP_PREFIX).unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryByteStore;

    fn engine() -> Engine {
        let engine = Engine::create().unwrap();
        for stmt in crate::schema::base_schema_statements() {
            engine.conn().execute(stmt, []).unwrap();
        }
        engine
    }

    #[tokio::test]
    async fn test_retention_bound() {
        let store = Arc::new(MemoryByteStore::new());
        let manager = BackupManager::new(store.clone());
        let engine = engine();

        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(manager.create(&engine).await.unwrap().key);
        }

        let remaining = manager.list().await.unwrap();
        assert_eq!(remaining.len(), RETAINED_BACKUPS);

        // The three most recently created survive
        let mut expected: Vec<String> = created[2..].to_vec();
        expected.reverse();
        let keys: Vec<String> = remaining.into_iter().map(|b| b.key).collect();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn test_list_sorted_most_recent_first() {
        let store = Arc::new(MemoryByteStore::new());
        let manager = BackupManager::new(store);
        let engine = engine();

        for _ in 0..3 {
            manager.create(&engine).await.unwrap();
        }

        let backups = manager.list().await.unwrap();
        for pair in backups.windows(2) {
            assert!(pair[0].date > pair[1].date);
        }
    }

    #[tokio::test]
    async fn test_export_round_trip() {
        let store = Arc::new(MemoryByteStore::new());
        let manager = BackupManager::new(store);
        let engine = engine();

        let info = manager.create(&engine).await.unwrap();
        let bytes = manager.export(&info.key).await.unwrap();
        crate::engine::validate_magic(&bytes).unwrap();
    }

    #[tokio::test]
    async fn test_export_missing_is_not_found() {
        let store = Arc::new(MemoryByteStore::new());
        let manager = BackupManager::new(store);

        let err = manager.export("querystash_backup_nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_backups_do_not_collide() {
        let store = Arc::new(MemoryByteStore::new());
        let manager = BackupManager::new(store);
        let engine = engine();

        let a = manager.create(&engine).await.unwrap();
        let b = manager.create(&engine).await.unwrap();
        assert_ne!(a.key, b.key);
    }
}
