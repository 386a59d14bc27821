//! SQLite-backed [`ChunkStore`].
//!
//! Vectors are stored as little-endian f32 BLOBs. A partition is replaced
//! inside one transaction (delete + insert), which is the atomic swap: WAL
//! readers keep seeing the previous snapshot until commit.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{ChunkStore, PartitionStats};
use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::migrate;
use crate::models::DocumentChunk;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the index database and apply migrations.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn replace_partition(&self, provider: &str, chunks: Vec<DocumentChunk>) -> Result<()> {
        let indexed_at = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE provider = ?")
            .bind(provider)
            .execute(&mut *tx)
            .await?;

        for (seq, chunk) in chunks.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO chunks (provider, seq, source, ordinal, content, hash,
                                    embedding, dims, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(provider)
            .bind(seq as i64)
            .bind(&chunk.source)
            .bind(chunk.ordinal as i64)
            .bind(&chunk.content)
            .bind(&chunk.hash)
            .bind(vec_to_blob(&chunk.vector))
            .bind(chunk.vector.len() as i64)
            .bind(indexed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_partition(&self, provider: &str) -> Result<Vec<DocumentChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT source, ordinal, content, hash, embedding
            FROM chunks
            WHERE provider = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(provider)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let ordinal: i64 = row.get("ordinal");
                DocumentChunk {
                    source: row.get("source"),
                    ordinal: ordinal as usize,
                    content: row.get("content"),
                    hash: row.get("hash"),
                    vector: blob_to_vec(&blob),
                }
            })
            .collect())
    }

    async fn partitions(&self) -> Result<Vec<PartitionStats>> {
        let rows = sqlx::query(
            r#"
            SELECT provider, COUNT(*) AS chunks, COUNT(DISTINCT source) AS sources
            FROM chunks
            GROUP BY provider
            ORDER BY provider ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                let sources: i64 = row.get("sources");
                PartitionStats {
                    provider: row.get("provider"),
                    chunks: chunks as usize,
                    sources: sources as usize,
                }
            })
            .collect())
    }
}
