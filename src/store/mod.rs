//! Storage abstraction for the retrieval index.
//!
//! A [`ChunkStore`] holds one snapshot of [`DocumentChunk`]s per provider
//! identity. Snapshots are only ever replaced whole: [`replace_partition`]
//! must publish the new snapshot atomically, so a concurrent
//! [`load_partition`] sees either the old snapshot or the new one, never a
//! mix.
//!
//! | Backend | Module |
//! |---------|--------|
//! | SQLite (default, persistent) | [`sqlite`] |
//! | In-memory (tests, embedding in other hosts) | [`memory`] |
//!
//! [`replace_partition`]: ChunkStore::replace_partition
//! [`load_partition`]: ChunkStore::load_partition

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::DocumentChunk;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Summary of one provider partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionStats {
    pub provider: String,
    pub chunks: usize,
    pub sources: usize,
}

#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Replace the whole snapshot for `provider` with `chunks`, in order.
    async fn replace_partition(&self, provider: &str, chunks: Vec<DocumentChunk>) -> Result<()>;

    /// Load the snapshot for `provider` in stored order. Unknown providers
    /// yield an empty snapshot.
    async fn load_partition(&self, provider: &str) -> Result<Vec<DocumentChunk>>;

    /// Per-provider summaries, sorted by provider.
    async fn partitions(&self) -> Result<Vec<PartitionStats>>;
}
