//! Byte store: asynchronous key-value persistence for exported buffers
//!
//! The host environment provides durable key-value storage; the database
//! engine itself only knows about in-memory bytes. Everything durable (the
//! primary buffer, backup snapshots) goes through this trait.

mod file;
mod memory;

pub use file::FileByteStore;
pub use memory::MemoryByteStore;

use crate::Result;

/// Key under which the primary database buffer is persisted
pub const DATABASE_KEY: &str = "querystash.db";

/// Asynchronous key-value persistence for byte buffers
#[async_trait::async_trait]
pub trait ByteStore: Send + Sync {
    /// Fetch the value for a key, if present
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value under a key, replacing any previous value
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a set of keys; missing keys are ignored
    async fn remove(&self, keys: &[String]) -> Result<()>;

    /// List all stored keys
    async fn keys(&self) -> Result<Vec<String>>;
}
