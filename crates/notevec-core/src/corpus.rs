//! Corpus enumeration: markdown files under a root, filtered by scope.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::CorpusConfig;
use crate::types::{Document, Scope};

/// A file found under the corpus root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    /// Relative to the corpus root, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    extensions: Vec<String>,
}

impl Corpus {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self { root: root.into(), extensions }
    }

    pub fn from_config(config: &CorpusConfig) -> Self {
        Self::new(config.root_dir(), config.extensions.clone())
    }

    /// All matching files inside `scope`, sorted by relative path.
    ///
    /// Hidden files and directories (leading `.`) are skipped, which keeps the
    /// index file itself and editor metadata out of the corpus. A missing root
    /// yields an empty list.
    pub fn list(&self, scope: &Scope) -> Vec<CorpusFile> {
        let mut files: Vec<CorpusFile> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && self.has_extension(e.path()))
            .filter_map(|e| {
                let rel_path = self.relative(e.path())?;
                scope.contains(&rel_path).then(|| CorpusFile { rel_path, abs_path: e.into_path() })
            })
            .collect();
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        debug!(root = %self.root.display(), scope = %scope, count = files.len(), "listed corpus files");
        files
    }

    /// Read every listed file. Unreadable files are logged and skipped.
    pub fn documents(&self, scope: &Scope) -> Vec<Document> {
        self.list(scope)
            .into_iter()
            .filter_map(|file| match fs::read(&file.abs_path) {
                Ok(bytes) => Some(Document::from_bytes(file.rel_path, &bytes)),
                Err(e) => {
                    warn!(path = %file.abs_path.display(), error = %e, "skipping unreadable document");
                    None
                }
            })
            .collect()
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
        Some(parts.join("/"))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}
