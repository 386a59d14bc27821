//! Retrieval index: rebuild from a docs directory, search by embedding.
//!
//! # Rebuild
//!
//! 1. Walk `docs_dir` for files matching the include globs (sorted by path).
//! 2. Split each file into paragraph chunks ([`crate::chunk`]).
//! 3. Embed every chunk with the active [`TextGenerator`]. Chunks whose
//!    embedding fails or comes back empty are skipped.
//! 4. Publish the new snapshot with one [`ChunkStore::replace_partition`]
//!    call, keyed by the generator's identity. If every chunk failed to
//!    embed, nothing is published and the previous partition stays.
//!
//! # Search
//!
//! The query is embedded with the same generator, every chunk in that
//! generator's partition is scored by cosine similarity, and the best
//! `top_k` chunks scoring strictly above `min_score` are returned. Search
//! never fails: a missing index or a failed query embedding yields no
//! results, and the caller proceeds without grounding context.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunk::chunk_text;
use crate::config::{IndexConfig, RetrievalConfig};
use crate::embedding::cosine_similarity;
use crate::generator::TextGenerator;
use crate::models::{DocumentChunk, ScoredChunk};
use crate::store::ChunkStore;

/// Counts reported by a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub files: usize,
    pub chunks: usize,
    /// Chunks dropped because their embedding failed.
    pub skipped: usize,
}

pub struct RetrievalIndex {
    store: Arc<dyn ChunkStore>,
    index: IndexConfig,
    retrieval: RetrievalConfig,
}

impl RetrievalIndex {
    pub fn new(store: Arc<dyn ChunkStore>, index: IndexConfig, retrieval: RetrievalConfig) -> Self {
        Self {
            store,
            index,
            retrieval,
        }
    }

    pub fn docs_dir(&self) -> &Path {
        &self.index.docs_dir
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Rebuild the configured docs directory for `generator`'s partition.
    pub async fn index_docs(&self, generator: &dyn TextGenerator) -> Result<RebuildStats> {
        let docs_dir = self.index.docs_dir.clone();
        self.rebuild(&docs_dir, generator).await
    }

    /// Replace `generator`'s partition with a fresh index of `docs_dir`.
    pub async fn rebuild(
        &self,
        docs_dir: &Path,
        generator: &dyn TextGenerator,
    ) -> Result<RebuildStats> {
        if !docs_dir.is_dir() {
            bail!("Docs directory does not exist: {}", docs_dir.display());
        }

        let provider = generator.identity();
        let files = self.scan_docs(docs_dir)?;
        let mut stats = RebuildStats::default();
        let mut snapshot: Vec<DocumentChunk> = Vec::new();

        info!(provider = %provider, dir = %docs_dir.display(), files = files.len(), "rebuilding index");

        for (path, source) in files {
            let text = match std::fs::read_to_string(&path) {
                Ok(t) => t,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            stats.files += 1;

            for chunk in chunk_text(&text, self.index.max_tokens) {
                match generator.embed(&chunk.text).await {
                    Ok(vector) if !vector.is_empty() => {
                        snapshot.push(DocumentChunk {
                            source: source.clone(),
                            ordinal: chunk.index,
                            content: chunk.text,
                            hash: chunk.hash,
                            vector,
                        });
                    }
                    Ok(_) => {
                        debug!(source = %source, ordinal = chunk.index, "empty embedding, skipping chunk");
                        stats.skipped += 1;
                    }
                    Err(e) => {
                        debug!(source = %source, ordinal = chunk.index, error = %e, "embedding failed, skipping chunk");
                        stats.skipped += 1;
                    }
                }
            }
        }

        stats.chunks = snapshot.len();
        if stats.chunks == 0 && stats.skipped > 0 {
            warn!(provider = %provider, skipped = stats.skipped, "no chunk embedded, keeping previous index");
            bail!(
                "Index not updated: all {} chunks failed to embed with {}",
                stats.skipped,
                provider
            );
        }
        self.store.replace_partition(&provider, snapshot).await?;

        info!(
            provider = %provider,
            files = stats.files,
            chunks = stats.chunks,
            skipped = stats.skipped,
            "index published"
        );
        Ok(stats)
    }

    /// Rank `generator`'s partition against `query`.
    pub async fn search(
        &self,
        query: &str,
        generator: &dyn TextGenerator,
        top_k: usize,
    ) -> Vec<ScoredChunk> {
        if query.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }

        let query_vec = match generator.embed(query).await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => return Vec::new(),
            Err(e) => {
                debug!(error = %e, "query embedding failed, continuing without context");
                return Vec::new();
            }
        };

        let chunks = match self.store.load_partition(&generator.identity()).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "index unavailable, continuing without context");
                return Vec::new();
            }
        };

        rank(chunks, &query_vec, top_k, self.retrieval.min_score)
    }

    /// Search with the configured `top_k` and render the result as context.
    pub async fn search_docs(&self, query: &str, generator: &dyn TextGenerator) -> String {
        let results = self.search(query, generator, self.retrieval.top_k).await;
        format_context(&results)
    }

    fn scan_docs(&self, docs_dir: &Path) -> Result<Vec<(PathBuf, String)>> {
        let include_set = build_globset(&self.index.include_globs)?;

        let mut excludes = vec!["**/.git/**".to_string()];
        excludes.extend(self.index.exclude_globs.clone());
        let exclude_set = build_globset(&excludes)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(docs_dir) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable path");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(docs_dir).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            files.push((path.to_path_buf(), rel_str));
        }

        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }
}

/// Score, stable-sort descending, apply the floor, keep `top_k`.
pub fn rank(
    chunks: Vec<DocumentChunk>,
    query_vec: &[f32],
    top_k: usize,
    min_score: f32,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let score = cosine_similarity(query_vec, &chunk.vector);
            ScoredChunk { chunk, score }
        })
        .filter(|s| s.score > min_score)
        .collect();

    // `sort_by` is stable: equal scores keep stored order
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}

/// Render search results as labeled blocks separated by blank lines.
pub fn format_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .map(|r| format!("--- DOCUMENT: {} ---\n{}\n", r.chunk.source, r.chunk.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
