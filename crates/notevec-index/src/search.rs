//! Brute-force cosine ranking over a loaded index snapshot.

use std::sync::Arc;

use tracing::debug;

use notevec_core::{EmbedProvider, Error, Result, Scope, SearchHit};

use crate::store::{IndexStore, LoadOrigin, VectorIndex};

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    pub scope: Scope,
    pub min_score: f32,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self { text: text.into(), top_k, scope: Scope::All, min_score: 0.0 }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The index has no entries at all.
    NoIndex,
    /// The index file exists but could not be read; a build replaces it.
    Unreadable(String),
    /// Entries exist, none inside the requested scope.
    EmptyScope,
    /// Possibly empty when nothing clears `min_score`.
    Ranked(Vec<SearchHit>),
}

/// Cosine similarity in `[-1, 1]`; `0` when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    score(dot(a, b), norm(a), norm(b))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn score(dot: f32, norm_a: f32, norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let s = dot / (norm_a * norm_b);
    if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) }
}

/// Read-only search over one snapshot. Never mutates or saves the index.
pub struct SearchEngine {
    index: Arc<VectorIndex>,
    norms: Vec<f32>,
    provider: Arc<dyn EmbedProvider>,
    corrupt: Option<String>,
}

impl SearchEngine {
    pub fn new(index: impl Into<Arc<VectorIndex>>, provider: Arc<dyn EmbedProvider>) -> Self {
        let index = index.into();
        let norms = index.entries.iter().map(|e| norm(&e.embedding)).collect();
        Self { index, norms, provider, corrupt: None }
    }

    /// Snapshot the index currently on disk. An unreadable file searches as
    /// [`SearchOutcome::Unreadable`].
    pub fn open(store: &IndexStore, provider: Arc<dyn EmbedProvider>) -> Self {
        let loaded = store.load();
        let mut engine = Self::new(loaded.index, provider);
        if let LoadOrigin::Corrupt(reason) = loaded.origin {
            engine.corrupt = Some(reason);
        }
        engine
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        if let Some(reason) = &self.corrupt {
            return Ok(SearchOutcome::Unreadable(reason.clone()));
        }
        if self.index.is_empty() {
            return Ok(SearchOutcome::NoIndex);
        }
        let candidates: Vec<usize> = (0..self.index.entries.len())
            .filter(|&i| query.scope.contains(&self.index.entries[i].file))
            .collect();
        if candidates.is_empty() {
            return Ok(SearchOutcome::EmptyScope);
        }
        if self.index.model != self.provider.model_id() {
            return Err(Error::ModelMismatch {
                index_model: self.index.model.clone(),
                provider_model: self.provider.model_id().to_string(),
            });
        }
        if self.index.dimensions != self.provider.dimensions() {
            return Err(Error::DimensionMismatch { expected: self.index.dimensions, actual: self.provider.dimensions() });
        }
        if query.top_k == 0 {
            return Ok(SearchOutcome::Ranked(Vec::new()));
        }

        let vector = self.provider.embed_one(&query.text).await.map_err(Error::QueryEmbedding)?;
        if vector.len() != self.index.dimensions {
            return Err(Error::DimensionMismatch { expected: self.index.dimensions, actual: vector.len() });
        }
        let hits = self.rank(&vector, &candidates, query.top_k, query.min_score);
        debug!(candidates = candidates.len(), hits = hits.len(), scope = %query.scope, "search ranked");
        Ok(SearchOutcome::Ranked(hits))
    }

    /// Score candidates, drop those under `min_score`, and keep the best `top_k`.
    /// Equal scores keep index order.
    fn rank(&self, query: &[f32], candidates: &[usize], top_k: usize, min_score: f32) -> Vec<SearchHit> {
        let query_norm = norm(query);
        let mut hits: Vec<SearchHit> = candidates
            .iter()
            .filter_map(|&i| {
                let entry = &self.index.entries[i];
                let s = score(dot(query, &entry.embedding), query_norm, self.norms[i]);
                (s >= min_score).then(|| SearchHit {
                    score: s,
                    file: entry.file.clone(),
                    chunk_index: entry.chunk_index,
                    text: entry.text.clone(),
                })
            })
            .collect();
        hits.sort_by(SearchHit::by_score_desc);
        hits.truncate(top_k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_bounds() {
        let v = [0.3, -1.2, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&v, &[0.0, 0.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 5.0]), 0.0);
    }

    #[test]
    fn score_is_clamped_and_never_nan() {
        assert_eq!(score(f32::NAN, 1.0, 1.0), 0.0);
        assert_eq!(score(1.0000001, 1.0, 1.0), 1.0);
    }
}
