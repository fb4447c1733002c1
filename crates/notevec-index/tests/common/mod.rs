#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use notevec_core::config::ChunkingConfig;
use notevec_core::{Chunker, Corpus, EmbedError, EmbedProvider, EmbedRequest};
use notevec_embed::FakeProvider;
use notevec_index::{IndexStore, Indexer};

pub const DIMS: usize = 16;

/// Provider that records every batch and can be told to fail on a given call.
pub struct ScriptedProvider {
    inner: FakeProvider,
    model: String,
    pub batches: Mutex<Vec<Vec<String>>>,
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
    failure: EmbedError,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::with_model("scripted-model")
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            inner: FakeProvider::new(DIMS),
            model: model.to_string(),
            batches: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            failure: EmbedError::Unavailable("scripted outage".into()),
        }
    }

    /// Fail the `call`-th embedding request (1-based) with `error`.
    pub fn failing_on(mut self, call: usize, error: EmbedError) -> Self {
        self.fail_on_call = Some(call);
        self.failure = error;
        self
    }

    pub fn recorded(&self) -> Vec<Vec<String>> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn embedded_texts(&self) -> usize {
        self.recorded().iter().map(Vec::len).sum()
    }

    pub fn reset(&self) {
        if let Ok(mut b) = self.batches.lock() {
            b.clear();
        }
    }
}

#[async_trait]
impl EmbedProvider for ScriptedProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, request: EmbedRequest<'_>) -> Result<Vec<Vec<f32>>, EmbedError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(self.failure.clone());
        }
        if let Ok(mut b) = self.batches.lock() {
            b.push(request.texts.to_vec());
        }
        self.inner.embed_batch(request).await
    }
}

/// Provider returning a fixed vector per text prefix; unknown texts get `fallback`.
pub struct TableProvider {
    pub table: Vec<(&'static str, Vec<f32>)>,
    pub fallback: Vec<f32>,
}

#[async_trait]
impl EmbedProvider for TableProvider {
    fn model_id(&self) -> &str {
        "table-model"
    }

    fn dimensions(&self) -> usize {
        self.fallback.len()
    }

    async fn embed_batch(&self, request: EmbedRequest<'_>) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(request
            .texts
            .iter()
            .map(|t| {
                self.table
                    .iter()
                    .find(|(prefix, _)| t.starts_with(prefix))
                    .map_or_else(|| self.fallback.clone(), |(_, v)| v.clone())
            })
            .collect())
    }
}

pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self { dir: TempDir::new().expect("tempdir") }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn index_path(&self) -> PathBuf {
        self.root().join(".vector_index.json")
    }

    pub fn store(&self) -> IndexStore {
        IndexStore::new(self.index_path())
    }

    pub fn write(&self, rel: &str, text: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, text).expect("write");
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.root().join(rel)).expect("remove");
    }

    pub fn indexer(&self, provider: Arc<dyn EmbedProvider>, max_chars: usize, batch_size: usize) -> Indexer {
        Indexer::from_parts(
            Corpus::new(self.root(), vec!["md".to_string()]),
            Chunker::new(ChunkingConfig { max_chars, ..ChunkingConfig::default() }),
            self.store(),
            provider,
            batch_size,
        )
    }
}
