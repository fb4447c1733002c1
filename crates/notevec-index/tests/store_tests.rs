mod common;

use std::fs;
use std::sync::Arc;

use common::{ScriptedProvider, Workspace};
use notevec_core::{Fingerprint, Scope};
use notevec_index::{merge, status, BuildOptions, IndexEntry, IndexStore, LoadOrigin, StatusReport, VectorIndex};

fn entry(file: &str, chunk_index: usize, text: &str) -> IndexEntry {
    IndexEntry {
        file: file.into(),
        chunk_index,
        text: text.into(),
        fingerprint: Fingerprint::from("fp"),
        embedding: vec![0.5, 0.5],
    }
}

#[test]
fn missing_file_loads_as_empty() {
    let ws = Workspace::new();
    let loaded = ws.store().load();
    assert_eq!(loaded.origin, LoadOrigin::Missing);
    assert!(loaded.index.is_empty());
    assert!(ws.store().try_load().expect("try_load").is_none());
}

#[test]
fn save_then_load_preserves_entries_and_leaves_no_temp_files() {
    let ws = Workspace::new();
    let store = IndexStore::new(ws.root().join("nested/dir/index.json"));
    let mut index = VectorIndex::empty("m", 2);
    index.set_entries(vec![entry("b.md", 0, "b"), entry("a.md", 1, "a1"), entry("a.md", 0, "a0")]);
    index.touch();
    store.save(&index).expect("save");

    let loaded = store.load();
    assert_eq!(loaded.origin, LoadOrigin::Loaded);
    assert_eq!(loaded.index, index);
    let keys: Vec<String> = loaded.index.entries.iter().map(|e| e.key().to_string()).collect();
    assert_eq!(keys, vec!["a.md::0", "a.md::1", "b.md::0"]);

    let names: Vec<_> = fs::read_dir(ws.root().join("nested/dir")).expect("dir").map(|e| e.expect("entry").file_name()).collect();
    assert_eq!(names, vec![std::ffi::OsString::from("index.json")]);
}

#[test]
fn legacy_files_load_with_unknown_fields_and_missing_fingerprints() {
    let ws = Workspace::new();
    let legacy = r#"{
        "model": "text-embedding-3-small",
        "dimensions": 2,
        "indexed_at": 1700000000.5,
        "generator": "older tool",
        "entries": [
            {"file": "memory/a.md", "chunk_index": 0, "text": "hi", "mtime": 1000.0, "embedding": [1.0, 0.0]}
        ]
    }"#;
    fs::write(ws.index_path(), legacy).expect("write");

    let index = ws.store().try_load().expect("load").expect("present");
    assert_eq!(index.last_built_at, Some(1_700_000_000.5));
    assert_eq!(index.len(), 1);
    assert!(index.entries[0].fingerprint.is_empty());
}

#[test]
fn inconsistent_dimensions_are_corruption() {
    let ws = Workspace::new();
    let bad = r#"{"model":"m","dimensions":3,"entries":[{"file":"a.md","chunk_index":0,"text":"t","embedding":[1.0]}]}"#;
    fs::write(ws.index_path(), bad).expect("write");
    assert!(ws.store().try_load().is_err());
    assert!(matches!(ws.store().load().origin, LoadOrigin::Corrupt(_)));
}

#[test]
fn merge_prefers_new_entries_on_key_collision() {
    let merged = merge(
        vec![entry("a.md", 0, "old"), entry("b.md", 0, "keep")],
        vec![entry("a.md", 0, "new"), entry("a.md", 1, "added")],
    );
    let texts: Vec<&str> = merged.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["new", "added", "keep"]);
}

#[test]
fn status_distinguishes_missing_from_empty() {
    let ws = Workspace::new();
    assert_eq!(status(&ws.store(), &[]).expect("status"), StatusReport::NoIndex);

    ws.store().save(&VectorIndex::empty("m", 2)).expect("save");
    let StatusReport::Present(st) = status(&ws.store(), &[]).expect("status") else {
        panic!("index should exist");
    };
    assert_eq!(st.chunk_count, 0);
    assert!(st.index_size_bytes > 0);
    assert!(st.last_built_at.is_none());
    assert!(!st.recovered_from_corruption);
}

#[test]
fn status_flags_recovered_corruption() {
    let ws = Workspace::new();
    fs::write(ws.index_path(), "not json").expect("write");
    let StatusReport::Present(st) = status(&ws.store(), &[]).expect("status") else {
        panic!("file exists");
    };
    assert!(st.recovered_from_corruption);
    assert_eq!(st.chunk_count, 0);
}

#[tokio::test]
async fn status_counts_chunks_per_scope() {
    let ws = Workspace::new();
    ws.write("memory/2026-01-01.md", "## Morning\ncoffee\n\n## Evening\ntea");
    ws.write("knowledge_graph/Tech/rust.md", "traits");
    ws.write("inbox.md", "loose note");
    ws.indexer(Arc::new(ScriptedProvider::new()), 2000, 100).build(&BuildOptions::default()).await.expect("build");

    let scopes = [Scope::prefix("knowledge", "knowledge_graph"), Scope::prefix("memory", "memory")];
    let StatusReport::Present(st) = status(&ws.store(), &scopes).expect("status") else {
        panic!("index should exist");
    };
    assert_eq!(st.chunk_count, 4);
    assert_eq!(st.file_count, 3);
    assert_eq!(st.per_scope_counts.get("memory"), Some(&2));
    assert_eq!(st.per_scope_counts.get("knowledge"), Some(&1));
    assert!(st.size_mb() > 0.0);
}
