//! Index schema migrations. Idempotent; safe to run on every open.

use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per chunk; `provider` partitions incompatible vector spaces
    // and `seq` preserves snapshot order.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            provider TEXT NOT NULL,
            seq INTEGER NOT NULL,
            source TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            content TEXT NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            indexed_at INTEGER NOT NULL,
            PRIMARY KEY (provider, source, ordinal)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_provider_seq ON chunks(provider, seq)")
        .execute(pool)
        .await?;

    Ok(())
}
