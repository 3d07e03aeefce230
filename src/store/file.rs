//! Directory-backed byte store used by the CLI

use std::path::PathBuf;

use crate::{ByteStore, Error, Result};

/// Byte store persisting each key as one file in a directory.
///
/// Keys are used verbatim as file names; callers keep them to characters that
/// are valid on the local filesystem (backup keys use a colon-free timestamp
/// format for this reason).
pub struct FileByteStore {
    root: PathBuf,
}

impl FileByteStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains("..") {
            return Err(Error::Store(format!("invalid store key: {:?}", key)));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait::async_trait]
impl ByteStore for FileByteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        // Write to a sibling then rename, so a crash never truncates the live buffer
        let tmp = self.root.join(format!("{}.tmp", key));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.path_for(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    if !name.ends_with(".tmp") {
                        keys.push(name.to_string());
                    }
                }
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileByteStore::open(dir.path()).unwrap();

        store.set("querystash.db", b"buffer").await.unwrap();
        assert_eq!(store.get("querystash.db").await.unwrap().unwrap(), b"buffer");

        store.set("querystash.db", b"replaced").await.unwrap();
        assert_eq!(store.get("querystash.db").await.unwrap().unwrap(), b"replaced");

        let keys = store.keys().await.unwrap();
        assert_eq!(keys, vec!["querystash.db"]);

        store.remove(&["querystash.db".to_string()]).await.unwrap();
        assert!(store.get("querystash.db").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileByteStore::open(dir.path()).unwrap();
        assert!(store.get("../outside").await.is_err());
        assert!(store.set("a/b", b"x").await.is_err());
    }
}
