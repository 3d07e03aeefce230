//! In-memory byte store for tests and embedding hosts

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{ByteStore, Error, Result};

/// Byte store backed by a process-local map
#[derive(Default)]
pub struct MemoryByteStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ByteStore for MemoryByteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().map_err(|e| Error::Store(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| Error::Store(e.to_string()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| Error::Store(e.to_string()))?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().map_err(|e| Error::Store(e.to_string()))?;
        Ok(entries.keys().cloned().collect())
    }
}
