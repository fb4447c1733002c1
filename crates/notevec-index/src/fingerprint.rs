//! Per-document change detection against the stored entries.

use std::collections::BTreeMap;

use notevec_core::{Document, Fingerprint};

use crate::store::IndexEntry;

/// How a document compares to what the index holds for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Nothing stored for this path.
    New,
    /// Some stored chunk carries a different (or no) fingerprint.
    Stale,
    /// Fingerprints match but the chunk boundaries or texts moved.
    Rechunked,
    Fresh,
}

impl Freshness {
    pub fn needs_embedding(self) -> bool {
        self != Self::Fresh
    }
}

#[derive(Debug)]
struct StoredChunk<'a> {
    fingerprint: &'a Fingerprint,
    text: &'a str,
}

/// Read-only view of the stored fingerprints and texts, grouped by file.
#[derive(Debug, Default)]
pub struct FingerprintStore<'a> {
    files: BTreeMap<&'a str, BTreeMap<usize, StoredChunk<'a>>>,
}

impl<'a> FingerprintStore<'a> {
    pub fn from_entries(entries: &'a [IndexEntry]) -> Self {
        let mut files: BTreeMap<&str, BTreeMap<usize, StoredChunk>> = BTreeMap::new();
        for e in entries {
            files
                .entry(e.file.as_str())
                .or_default()
                .insert(e.chunk_index, StoredChunk { fingerprint: &e.fingerprint, text: &e.text });
        }
        Self { files }
    }

    /// Compare `doc` and its fresh chunk texts with the stored entries.
    ///
    /// A document is reused only if every stored chunk has its fingerprint and
    /// the stored texts equal the fresh chunks index for index.
    pub fn classify(&self, doc: &Document, chunks: &[String]) -> Freshness {
        let Some(stored) = self.files.get(doc.path.as_str()) else {
            // A document without chunks never has stored entries.
            return if chunks.is_empty() { Freshness::Fresh } else { Freshness::New };
        };
        if stored.values().any(|c| c.fingerprint.is_empty() || *c.fingerprint != doc.fingerprint) {
            return Freshness::Stale;
        }
        if stored.len() != chunks.len() {
            return Freshness::Rechunked;
        }
        let same = chunks
            .iter()
            .enumerate()
            .all(|(i, text)| stored.get(&i).is_some_and(|c| c.text == text.as_str()));
        if same { Freshness::Fresh } else { Freshness::Rechunked }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(file: &str, idx: usize, text: &str, fp: &str) -> IndexEntry {
        IndexEntry {
            file: file.into(),
            chunk_index: idx,
            text: text.into(),
            fingerprint: Fingerprint::from(fp),
            embedding: vec![1.0],
        }
    }

    #[test]
    fn classifies_each_signal() {
        let doc = Document::from_bytes("a.md", b"alpha");
        let fp = doc.fingerprint.as_str().to_string();
        let chunks = vec!["alpha".to_string()];

        assert_eq!(FingerprintStore::default().classify(&doc, &chunks), Freshness::New);

        let fresh = [entry("a.md", 0, "alpha", &fp)];
        assert_eq!(FingerprintStore::from_entries(&fresh).classify(&doc, &chunks), Freshness::Fresh);

        let stale = [entry("a.md", 0, "alpha", "old")];
        assert_eq!(FingerprintStore::from_entries(&stale).classify(&doc, &chunks), Freshness::Stale);

        let legacy = [entry("a.md", 0, "alpha", "")];
        assert_eq!(FingerprintStore::from_entries(&legacy).classify(&doc, &chunks), Freshness::Stale);

        assert_eq!(FingerprintStore::default().classify(&doc, &[]), Freshness::Fresh);
        assert_eq!(FingerprintStore::from_entries(&fresh).classify(&doc, &[]), Freshness::Rechunked);

        let moved = [entry("a.md", 0, "alp", &fp), entry("a.md", 1, "ha", &fp)];
        assert_eq!(FingerprintStore::from_entries(&moved).classify(&doc, &chunks), Freshness::Rechunked);
    }
}
