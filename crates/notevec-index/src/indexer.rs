//! Incremental index builds.
//!
//! A build walks the scoped corpus, re-chunks every document, and embeds only
//! the chunks of documents whose fingerprint or chunk texts changed. Pending
//! chunks are embedded in bounded batches and the index is saved after every
//! batch, so a failed or cancelled build resumes instead of restarting.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use notevec_core::{
    Chunk, ChunkKey, Chunker, Corpus, EmbedProvider, EmbedRequest, EngineConfig, Error, Result, Scope,
};

use crate::fingerprint::FingerprintStore;
use crate::store::{IndexEntry, IndexStore, LoadOrigin, VectorIndex};

/// Shared flag checked before every embedding batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub scope: Scope,
    /// Re-embed every in-scope document regardless of fingerprints.
    pub force: bool,
    /// Draw a progress bar over the embedding batches.
    pub progress: bool,
    pub cancel: CancelFlag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// No documents in scope and nothing stored to prune. The index was not touched.
    NothingToDo,
    /// No embedding calls were needed.
    UpToDate,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub files_scanned: usize,
    pub files_reembedded: usize,
    pub chunks_written: usize,
    pub chunks_reused: usize,
    /// Entries in the saved index, all scopes included.
    pub chunks_total: usize,
    pub batches: usize,
    pub outcome: BuildOutcome,
}

pub struct Indexer {
    corpus: Corpus,
    chunker: Chunker,
    store: IndexStore,
    provider: Arc<dyn EmbedProvider>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(config: &EngineConfig, provider: Arc<dyn EmbedProvider>) -> Self {
        Self::from_parts(
            Corpus::from_config(&config.corpus),
            Chunker::new(config.chunking.clone()),
            IndexStore::new(config.corpus.index_file()),
            provider,
            config.indexer.batch_size,
        )
    }

    pub fn from_parts(
        corpus: Corpus,
        chunker: Chunker,
        store: IndexStore,
        provider: Arc<dyn EmbedProvider>,
        batch_size: usize,
    ) -> Self {
        Self { corpus, chunker, store, provider, batch_size: batch_size.max(1) }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub async fn build(&self, options: &BuildOptions) -> Result<BuildReport> {
        let model = self.provider.model_id().to_string();
        let dims = self.provider.dimensions();
        let mut index = self.prepare_index(&model, dims, options)?;

        let docs = self.corpus.documents(&options.scope);
        let present: BTreeSet<&str> = docs.iter().map(|d| d.path.as_str()).collect();

        let mut pending: Vec<Chunk> = Vec::new();
        let mut dirty: BTreeSet<String> = BTreeSet::new();
        let mut chunks_reused = 0;
        {
            let fingerprints = FingerprintStore::from_entries(&index.entries);
            for doc in &docs {
                let texts = self.chunker.chunk(&doc.text);
                let freshness = fingerprints.classify(doc, &texts);
                if !options.force && !freshness.needs_embedding() {
                    chunks_reused += texts.len();
                    continue;
                }
                debug!(path = %doc.path, ?freshness, chunks = texts.len(), "document needs embedding");
                dirty.insert(doc.path.clone());
                pending.extend(texts.into_iter().enumerate().map(|(chunk_index, text)| Chunk {
                    document_path: doc.path.clone(),
                    chunk_index,
                    text,
                    fingerprint: doc.fingerprint.clone(),
                }));
            }
        }

        let mut working: BTreeMap<ChunkKey, IndexEntry> =
            std::mem::take(&mut index.entries).into_iter().map(|e| (e.key(), e)).collect();
        let before = working.len();
        working.retain(|key, _| !options.scope.contains(&key.file) || present.contains(key.file.as_str()));
        let pruned = before - working.len();

        if docs.is_empty() && pruned == 0 {
            info!(scope = %options.scope, "no documents in scope, nothing to do");
            return Ok(BuildReport {
                files_scanned: 0,
                files_reembedded: 0,
                chunks_written: 0,
                chunks_reused: 0,
                chunks_total: working.len(),
                batches: 0,
                outcome: BuildOutcome::NothingToDo,
            });
        }
        if pruned > 0 {
            info!(pruned, "dropping entries of vanished documents");
        }

        let batches = pending.len().div_ceil(self.batch_size);
        let mut written: BTreeSet<ChunkKey> = BTreeSet::new();
        if batches > 0 {
            info!(
                documents = dirty.len(),
                chunks = pending.len(),
                batches,
                model = %model,
                "embedding changed documents"
            );
            let bar = progress_bar(options.progress, batches);
            for (i, batch) in pending.chunks(self.batch_size).enumerate() {
                if options.cancel.is_cancelled() {
                    bar.abandon_with_message("cancelled");
                    warn!(completed = i, total = batches, "build cancelled");
                    return Err(Error::Cancelled { completed: i, total: batches });
                }
                let entries = match self.embed_batch(batch, dims, i + 1, batches).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        bar.abandon();
                        return Err(e);
                    }
                };
                for entry in entries {
                    written.insert(entry.key());
                    working.insert(entry.key(), entry);
                }
                index.set_entries(working.values().cloned());
                self.store.save(&index)?;
                bar.inc(1);
                debug!(batch = i + 1, batches, "batch merged and saved");
            }
            bar.finish_and_clear();
        }

        // Leftover chunks of re-embedded documents whose chunk count shrank.
        working.retain(|key, _| !dirty.contains(&key.file) || written.contains(key));

        index.set_entries(working.into_values());
        index.touch();
        self.store.save(&index)?;

        let report = BuildReport {
            files_scanned: docs.len(),
            files_reembedded: dirty.len(),
            chunks_written: written.len(),
            chunks_reused,
            chunks_total: index.len(),
            batches,
            outcome: if batches == 0 { BuildOutcome::UpToDate } else { BuildOutcome::Updated },
        };
        info!(
            files = report.files_scanned,
            reembedded = report.files_reembedded,
            written = report.chunks_written,
            reused = report.chunks_reused,
            total = report.chunks_total,
            "index build finished"
        );
        Ok(report)
    }

    /// Load the stored index and reset it when it was built for another vector space.
    /// A scoped build may not discard other scopes, so it refuses unless forced.
    fn prepare_index(&self, model: &str, dims: usize, options: &BuildOptions) -> Result<VectorIndex> {
        let loaded = self.store.load();
        if let LoadOrigin::Corrupt(reason) = &loaded.origin {
            warn!(%reason, "stored index is unreadable, rebuilding from scratch");
        }
        let mut index = loaded.index;
        if loaded.origin == LoadOrigin::Loaded && (index.model != model || index.dimensions != dims) {
            if options.scope != Scope::All && !options.force && !index.is_empty() {
                return Err(Error::ModelMismatch { index_model: index.model, provider_model: model.to_string() });
            }
            warn!(
                stored_model = %index.model,
                stored_dims = index.dimensions,
                model,
                dims,
                "embedding model changed, discarding stored vectors"
            );
            index.entries.clear();
        }
        index.model = model.to_string();
        index.dimensions = dims;
        index.format_version = crate::store::FORMAT_VERSION;
        Ok(index)
    }

    async fn embed_batch(&self, batch: &[Chunk], dims: usize, number: usize, total: usize) -> Result<Vec<IndexEntry>> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let files = || -> Vec<String> {
            let files: BTreeSet<String> = batch.iter().map(|c| c.document_path.clone()).collect();
            files.into_iter().collect()
        };
        let rejected = |source: Error| Error::BatchRejected {
            batch: number,
            batches: total,
            files: files(),
            source: Box::new(source),
        };
        let vectors = self
            .provider
            .embed_batch(EmbedRequest::new(&texts, dims))
            .await
            .map_err(|source| Error::Embedding { batch: number, batches: total, files: files(), source })?;
        if vectors.len() != batch.len() {
            return Err(rejected(Error::MalformedResponse { expected: batch.len(), actual: vectors.len() }));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(rejected(Error::DimensionMismatch { expected: dims, actual: bad.len() }));
        }
        Ok(batch
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| IndexEntry {
                file: chunk.document_path.clone(),
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                fingerprint: chunk.fingerprint.clone(),
                embedding,
            })
            .collect())
    }
}

fn progress_bar(enabled: bool, batches: usize) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(batches as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({percent}%) {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
