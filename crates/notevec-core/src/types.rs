//! Domain types shared by the chunker, the index store and the search engine.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque marker of a document's content state. Changes whenever the content does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// blake3 hash of the raw document bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3_hex(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn blake3_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// A source document read fresh on every indexing pass. Never persisted.
///
/// - `path`: path relative to the corpus root, `/`-separated
/// - `fingerprint`: content hash used for change detection
/// - `text`: raw text (lossily decoded when not valid UTF-8)
#[derive(Debug, Clone)]
pub struct Document {
    pub path: String,
    pub fingerprint: Fingerprint,
    pub text: String,
}

impl Document {
    pub fn from_bytes(path: impl Into<String>, bytes: &[u8]) -> Self {
        let fingerprint = Fingerprint::of_bytes(bytes);
        let text = String::from_utf8_lossy(bytes).into_owned();
        Self { path: path.into(), fingerprint, text }
    }
}

/// Identity of a chunk inside the index: owning document plus position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub file: String,
    pub chunk_index: usize,
}

impl ChunkKey {
    pub fn new(file: impl Into<String>, chunk_index: usize) -> Self {
        Self { file: file.into(), chunk_index }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.file, self.chunk_index)
    }
}

/// A chunk waiting for its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_path: String,
    pub chunk_index: usize,
    pub text: String,
    pub fingerprint: Fingerprint,
}

impl Chunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.document_path.clone(), self.chunk_index)
    }
}

/// Subset of the corpus selected by a relative path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Prefix { name: String, prefix: String },
}

impl Scope {
    pub fn prefix(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        Self::Prefix { name: name.into(), prefix }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Prefix { name, .. } => name,
        }
    }

    /// True when `path` (relative, `/`-separated) lies inside this scope.
    pub fn contains(&self, path: &str) -> bool {
        match self {
            Self::All => true,
            Self::Prefix { prefix, .. } if prefix.is_empty() => true,
            Self::Prefix { prefix, .. } => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/')),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A ranked search result. Higher `score` is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub file: String,
    pub chunk_index: usize,
    pub text: String,
}

impl SearchHit {
    /// First `max_chars` characters of the chunk, with `...` appended when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.text[..cut]),
            None => self.text.clone(),
        }
    }

    /// Descending by score; equal scores keep their relative order under a stable sort.
    pub fn by_score_desc(a: &Self, b: &Self) -> Ordering {
        b.score.total_cmp(&a.score)
    }
}
