use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use privy::config::{IndexConfig, RetrievalConfig};
use privy::error::ProviderError;
use privy::generator::TextGenerator;
use privy::index::RetrievalIndex;
use privy::store::{ChunkStore, InMemoryStore, SqliteStore};
use tempfile::TempDir;

const VOCAB: &[&str] = &[
    "aliens", "secret", "disk", "network", "memory", "docker", "nginx", "backup",
];

/// Bag-of-words embedder over a fixed vocabulary.
struct VocabEmbedder {
    identity: String,
}

impl VocabEmbedder {
    fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for VocabEmbedder {
    fn name(&self) -> &str {
        "vocab"
    }

    fn identity(&self) -> String {
        self.identity.clone()
    }

    async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, ProviderError> {
        Ok(String::new())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let lowered = text.to_lowercase();
        if lowered.contains("embed-fails") {
            return Err(ProviderError::Http {
                status: 500,
                body: "boom".to_string(),
            });
        }
        if lowered.contains("embed-empty") {
            return Ok(Vec::new());
        }
        Ok(VOCAB
            .iter()
            .map(|w| lowered.matches(w).count() as f32)
            .collect())
    }

    async fn ready(&self) -> bool {
        true
    }
}

fn write_corpus(dir: &Path) {
    fs::write(
        dir.join("test_doc.txt"),
        "This is a secret document about aliens.",
    )
    .unwrap();
    fs::write(
        dir.join("ops.md"),
        "# Operations\n\nCheck disk usage with df -h.\n\nRestart nginx with systemctl restart nginx.\n\nDocker images live in /var/lib/docker.",
    )
    .unwrap();
    fs::create_dir_all(dir.join("net")).unwrap();
    fs::write(
        dir.join("net/interfaces.md"),
        "Show network interfaces with ip addr.",
    )
    .unwrap();
    fs::write(dir.join("ignored.json"), "{\"aliens\": true}").unwrap();
}

fn index_with(store: Arc<dyn ChunkStore>, docs: &Path) -> RetrievalIndex {
    let index_cfg = IndexConfig {
        docs_dir: docs.to_path_buf(),
        ..IndexConfig::default()
    };
    RetrievalIndex::new(store, index_cfg, RetrievalConfig::default())
}

#[tokio::test]
async fn test_search_finds_paragraph_and_source() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let index = index_with(Arc::new(InMemoryStore::new()), tmp.path());
    let embedder = VocabEmbedder::new("vocab:v1");

    let stats = index.index_docs(&embedder).await.unwrap();
    assert_eq!(stats.files, 3);
    assert_eq!(stats.skipped, 0);

    let context = index.search_docs("aliens", &embedder).await;
    assert!(context.contains("test_doc.txt"));
    assert!(context.contains("This is a secret document about aliens."));
    assert!(!context.contains("ignored.json"));
}

#[tokio::test]
async fn test_no_overlap_yields_empty_context() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let index = index_with(Arc::new(InMemoryStore::new()), tmp.path());
    let embedder = VocabEmbedder::new("vocab:v1");
    index.index_docs(&embedder).await.unwrap();

    assert_eq!(index.search_docs("xyzzy-nonmatch", &embedder).await, "");
}

#[tokio::test]
async fn test_empty_or_absent_index_yields_empty_context() {
    let tmp = TempDir::new().unwrap();
    let index = index_with(Arc::new(InMemoryStore::new()), tmp.path());
    let embedder = VocabEmbedder::new("vocab:v1");
    assert_eq!(index.search_docs("aliens", &embedder).await, "");

    let db = SqliteStore::open(&tmp.path().join("index.sqlite"))
        .await
        .unwrap();
    let index = index_with(Arc::new(db), tmp.path());
    assert_eq!(index.search_docs("aliens", &embedder).await, "");
}

#[tokio::test]
async fn test_failed_query_embedding_yields_empty_context() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let index = index_with(Arc::new(InMemoryStore::new()), tmp.path());
    let embedder = VocabEmbedder::new("vocab:v1");
    index.index_docs(&embedder).await.unwrap();

    assert_eq!(index.search_docs("aliens embed-fails", &embedder).await, "");
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    write_corpus(&docs);

    let store = Arc::new(SqliteStore::open(&tmp.path().join("index.sqlite")).await.unwrap());
    let index = index_with(store.clone(), &docs);
    let embedder = VocabEmbedder::new("vocab:v1");

    let first = index.index_docs(&embedder).await.unwrap();
    let hashes_first: Vec<String> = store
        .load_partition("vocab:v1")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.hash)
        .collect();

    let second = index.index_docs(&embedder).await.unwrap();
    let hashes_second: Vec<String> = store
        .load_partition("vocab:v1")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.hash)
        .collect();

    assert_eq!(first, second);
    assert_eq!(hashes_first.len(), first.chunks);
    assert_eq!(hashes_first, hashes_second);
}

#[tokio::test]
async fn test_failed_embeddings_are_skipped() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("mixed.md"),
        "Back up with rsync backup.\n\nembed-fails here.\n\nembed-empty here.",
    )
    .unwrap();

    let store = Arc::new(InMemoryStore::new());
    let index = index_with(store.clone(), tmp.path());
    let embedder = VocabEmbedder::new("vocab:v1");

    let stats = index.index_docs(&embedder).await.unwrap();
    assert_eq!(stats.chunks, 1);
    assert_eq!(stats.skipped, 2);

    let stored = store.load_partition("vocab:v1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "Back up with rsync backup.");
    assert!(stored.iter().all(|c| !c.vector.is_empty()));
}

#[tokio::test]
async fn test_rebuild_with_every_embedding_failing_keeps_previous_index() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    write_corpus(&docs);

    let store = Arc::new(SqliteStore::open(&tmp.path().join("index.sqlite")).await.unwrap());
    let index = index_with(store.clone(), &docs);
    let embedder = VocabEmbedder::new("vocab:v1");
    let before = index.index_docs(&embedder).await.unwrap();
    assert!(before.chunks > 0);

    fs::remove_dir_all(&docs).unwrap();
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("down.md"), "embed-fails one.\n\nembed-fails two.").unwrap();

    let err = index.index_docs(&embedder).await.unwrap_err();
    assert!(err.to_string().contains("all 2 chunks failed to embed"), "{err}");

    let stored = store.load_partition("vocab:v1").await.unwrap();
    assert_eq!(stored.len(), before.chunks);
    assert!(index.search_docs("aliens", &embedder).await.contains("test_doc.txt"));
}

#[tokio::test]
async fn test_partitions_are_kept_apart() {
    let tmp = TempDir::new().unwrap();
    let docs_a = tmp.path().join("a");
    let docs_b = tmp.path().join("b");
    fs::create_dir_all(&docs_a).unwrap();
    fs::create_dir_all(&docs_b).unwrap();
    fs::write(docs_a.join("a.md"), "All about aliens.").unwrap();
    fs::write(docs_b.join("b.md"), "All about docker.").unwrap();

    let store = Arc::new(SqliteStore::open(&tmp.path().join("index.sqlite")).await.unwrap());
    let index = index_with(store.clone(), &docs_a);
    let one = VocabEmbedder::new("vocab:one");
    let two = VocabEmbedder::new("vocab:two");

    index.rebuild(&docs_a, &one).await.unwrap();
    index.rebuild(&docs_b, &two).await.unwrap();

    assert!(index.search_docs("aliens", &one).await.contains("a.md"));
    assert_eq!(index.search_docs("aliens", &two).await, "");
    assert!(index.search_docs("docker", &two).await.contains("b.md"));

    let partitions = store.partitions().await.unwrap();
    assert_eq!(partitions.len(), 2);
}

#[tokio::test]
async fn test_rebuild_missing_dir_is_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope");
    let index = index_with(Arc::new(InMemoryStore::new()), &missing);
    let embedder = VocabEmbedder::new("vocab:v1");

    let err = index.index_docs(&embedder).await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn test_top_k_and_ranking() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("n.md"),
        "network\n\nnetwork memory\n\nnetwork memory disk\n\nnetwork memory disk backup",
    )
    .unwrap();
    let index = index_with(Arc::new(InMemoryStore::new()), tmp.path());
    let embedder = VocabEmbedder::new("vocab:v1");
    index.index_docs(&embedder).await.unwrap();

    let results = index.search("network", &embedder, 2).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk.content, "network");
    assert_eq!(results[1].chunk.content, "network memory");
    assert!(results[0].score >= results[1].score);
}
