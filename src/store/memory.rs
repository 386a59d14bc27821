//! In-memory [`ChunkStore`] for tests and hosts without a database.
//!
//! Each partition is an `Arc<Vec<_>>` behind a `RwLock`. A rebuild swaps the
//! `Arc` under a single write lock, so readers holding the previous snapshot
//! are unaffected.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{ChunkStore, PartitionStats};
use crate::models::DocumentChunk;

#[derive(Default)]
pub struct InMemoryStore {
    partitions: RwLock<HashMap<String, Arc<Vec<DocumentChunk>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot for `provider`, shared rather than copied.
    pub fn snapshot(&self, provider: &str) -> Option<Arc<Vec<DocumentChunk>>> {
        self.partitions
            .read()
            .ok()
            .and_then(|p| p.get(provider).cloned())
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn replace_partition(&self, provider: &str, chunks: Vec<DocumentChunk>) -> Result<()> {
        let snapshot = Arc::new(chunks);
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        partitions.insert(provider.to_string(), snapshot);
        Ok(())
    }

    async fn load_partition(&self, provider: &str) -> Result<Vec<DocumentChunk>> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        Ok(partitions
            .get(provider)
            .map(|s| s.as_ref().clone())
            .unwrap_or_default())
    }

    async fn partitions(&self) -> Result<Vec<PartitionStats>> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        let mut stats: Vec<PartitionStats> = partitions
            .iter()
            .map(|(provider, chunks)| PartitionStats {
                provider: provider.clone(),
                chunks: chunks.len(),
                sources: chunks
                    .iter()
                    .map(|c| c.source.as_str())
                    .collect::<HashSet<_>>()
                    .len(),
            })
            .collect();
        stats.sort_by(|a, b| a.provider.cmp(&b.provider));
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, ordinal: usize, content: &str) -> DocumentChunk {
        DocumentChunk {
            source: source.to_string(),
            ordinal,
            content: content.to_string(),
            hash: crate::chunk::content_hash(content),
            vector: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn test_unknown_partition_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.load_partition("ollama:x").await.unwrap().is_empty());
        assert!(store.partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_supersedes() {
        let store = InMemoryStore::new();
        store
            .replace_partition("p", vec![chunk("a.md", 0, "one"), chunk("a.md", 1, "two")])
            .await
            .unwrap();
        store
            .replace_partition("p", vec![chunk("b.md", 0, "three")])
            .await
            .unwrap();

        let loaded = store.load_partition("p").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "three");
    }

    #[tokio::test]
    async fn test_old_snapshot_survives_swap() {
        let store = InMemoryStore::new();
        store
            .replace_partition("p", vec![chunk("a.md", 0, "old")])
            .await
            .unwrap();
        let held = store.snapshot("p").unwrap();

        store
            .replace_partition("p", vec![chunk("a.md", 0, "new")])
            .await
            .unwrap();

        assert_eq!(held[0].content, "old");
        assert_eq!(store.snapshot("p").unwrap()[0].content, "new");
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let store = InMemoryStore::new();
        store
            .replace_partition("ollama:a", vec![chunk("a.md", 0, "x"), chunk("b.md", 0, "y")])
            .await
            .unwrap();
        store
            .replace_partition("gemini:b", vec![chunk("a.md", 0, "z")])
            .await
            .unwrap();

        let stats = store.partitions().await.unwrap();
        assert_eq!(
            stats,
            vec![
                PartitionStats {
                    provider: "gemini:b".to_string(),
                    chunks: 1,
                    sources: 1
                },
                PartitionStats {
                    provider: "ollama:a".to_string(),
                    chunks: 2,
                    sources: 2
                },
            ]
        );
    }
}
