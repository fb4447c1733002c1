//! Index summary without any embedding work.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use notevec_core::{Result, Scope};

use crate::store::{IndexStore, LoadOrigin};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatusReport {
    /// No index file exists.
    NoIndex,
    Present(IndexStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatus {
    pub path: PathBuf,
    pub model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub file_count: usize,
    /// Chunk counts per named scope, in scope-name order.
    pub per_scope_counts: BTreeMap<String, usize>,
    pub index_size_bytes: u64,
    pub last_built_at: Option<DateTime<Utc>>,
    /// The file exists but could not be read; it reports as empty and the next build rebuilds it.
    pub recovered_from_corruption: bool,
}

impl IndexStatus {
    pub fn size_mb(&self) -> f64 {
        self.index_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

pub fn status(store: &IndexStore, scopes: &[Scope]) -> Result<StatusReport> {
    if !store.exists() {
        return Ok(StatusReport::NoIndex);
    }
    let index_size_bytes = fs::metadata(store.path())?.len();
    let loaded = store.load();
    let index = loaded.index;

    let per_scope_counts = scopes
        .iter()
        .map(|scope| {
            let count = index.entries.iter().filter(|e| scope.contains(&e.file)).count();
            (scope.name().to_string(), count)
        })
        .collect();

    Ok(StatusReport::Present(IndexStatus {
        path: store.path().to_path_buf(),
        chunk_count: index.len(),
        file_count: index.file_count(),
        per_scope_counts,
        index_size_bytes,
        last_built_at: index.last_built_at.filter(|t| *t > 0.0).and_then(to_datetime),
        recovered_from_corruption: matches!(loaded.origin, LoadOrigin::Corrupt(_)),
        model: index.model,
        dimensions: index.dimensions,
    }))
}

fn to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
}
